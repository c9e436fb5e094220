//! Integration tests for the order lifecycle: legal and illegal
//! transitions, ownership checks, and the admin/customer race on a pending
//! order.

mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use hamperhouse_api::auth::Role;
use hamperhouse_api::entities::order::OrderStatus;
use hamperhouse_api::errors::ServiceError;
use hamperhouse_api::services::order_status::Actor;
use hamperhouse_api::services::orders::{NewOrder, NewOrderItem, PaymentProof};

async fn seed_order(app: &TestApp, user_id: Uuid) -> i64 {
    let (order, _items) = app
        .state
        .services
        .orders
        .insert(NewOrder {
            customer_name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            address: "12 MG Road, Bengaluru".to_string(),
            email: Some("asha@example.com".to_string()),
            user_id: Some(user_id),
            items: vec![NewOrderItem {
                product_id: "hamper-festive".to_string(),
                name: "Festive Hamper".to_string(),
                category: "hampers".to_string(),
                unit_price: dec!(450),
                quantity: 2,
                thumbnail: None,
            }],
            discount: dec!(0),
            payment: PaymentProof::PayAtPickup,
            is_delivery: true,
        })
        .await
        .expect("seed order");
    order.id
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn admin_walks_order_to_completion() {
    let app = TestApp::new().await;
    let admin = app.token_for(Uuid::new_v4(), Role::Admin);
    let order_id = seed_order(&app, Uuid::new_v4()).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&admin),
            Some(json!({ "status": "processing" })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["status"], "processing");

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&admin),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(response.status(), 200);

    // Terminal: attempting to reopen is rejected as illegal, not not-found
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&admin),
            Some(json!({ "status": "processing" })),
        )
        .await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn missing_order_is_distinct_from_illegal_transition() {
    let app = TestApp::new().await;
    let admin = app.token_for(Uuid::new_v4(), Role::Admin);

    let response = app
        .request(
            Method::PUT,
            "/api/v1/orders/999999/status",
            Some(&admin),
            Some(json!({ "status": "processing" })),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn customer_may_cancel_only_their_own_pending_order() {
    let app = TestApp::new().await;
    let owner_id = Uuid::new_v4();
    let owner = app.token_for(owner_id, Role::Customer);
    let stranger = app.token_for(Uuid::new_v4(), Role::Customer);
    let admin = app.token_for(Uuid::new_v4(), Role::Admin);

    // A stranger cannot cancel someone else's order
    let order_id = seed_order(&app, owner_id).await;
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            Some(&stranger),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);

    // The owner can, while it is still pending
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["status"], "cancelled");

    // Once processing has begun, customer cancellation is refused
    let order_id = seed_order(&app, owner_id).await;
    app.request(
        Method::PUT,
        &format!("/api/v1/orders/{order_id}/status"),
        Some(&admin),
        Some(json!({ "status": "processing" })),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn racing_admin_and_customer_transitions_have_one_winner() {
    let app = TestApp::new().await;
    let owner_id = Uuid::new_v4();
    let order_id = seed_order(&app, owner_id).await;

    let lifecycle = app.state.services.lifecycle.clone();
    let admin_side = lifecycle.transition(order_id, OrderStatus::Processing, Actor::Admin);
    let customer_side = app.state.services.lifecycle.cancel_own(order_id, owner_id);

    let (admin_result, customer_result) = tokio::join!(admin_side, customer_side);

    let winners = [admin_result.is_ok(), customer_result.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(winners, 1, "exactly one transition must win");

    // The loser observed a precondition failure, never a silent overwrite
    let loser_error = if admin_result.is_ok() {
        customer_result.unwrap_err()
    } else {
        admin_result.unwrap_err()
    };
    assert!(matches!(
        loser_error,
        ServiceError::IllegalTransition { .. }
    ));

    let final_status = app
        .state
        .services
        .orders
        .find_by_id(order_id)
        .await
        .unwrap()
        .unwrap()
        .status;
    assert!(matches!(
        final_status,
        OrderStatus::Processing | OrderStatus::Cancelled
    ));
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn customer_cannot_use_admin_status_endpoint() {
    let app = TestApp::new().await;
    let customer = app.token_for(Uuid::new_v4(), Role::Customer);
    let order_id = seed_order(&app, Uuid::new_v4()).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&customer),
            Some(json!({ "status": "processing" })),
        )
        .await;
    assert_eq!(response.status(), 403);
}

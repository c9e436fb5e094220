//! Token validation for identities minted by the external identity provider.
//!
//! This service never issues credentials. It validates the provider's bearer
//! tokens (HS256, shared secret) and exposes the authenticated principal to
//! handlers through the [`AuthUser`] and [`AdminUser`] extractors.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;

/// Claims carried by the identity provider's tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque user id (UUID) assigned by the identity provider
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Customer,
}

/// Authenticated principal extracted from a bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Principal that has passed the elevated-privilege check
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingAuth,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("admin privileges required")]
    AdminRequired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingAuth | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::AdminRequired => StatusCode::FORBIDDEN,
        };
        let body = Json(serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

fn validate_bearer(parts: &Parts, state: &AppState) -> Result<AuthUser, AuthError> {
    let auth_value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingAuth)?
        .trim();

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[state.config.auth_issuer.as_str()]);
    validation.set_audience(&[state.config.auth_audience.as_str()]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    let user_id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| AuthError::InvalidToken("subject is not a valid user id".to_string()))?;

    Ok(AuthUser {
        user_id,
        email: data.claims.email,
        role: data.claims.role,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        validate_bearer(parts, state)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = validate_bearer(parts, state)?;
        if !user.is_admin() {
            return Err(AuthError::AdminRequired);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_customer() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": Uuid::new_v4().to_string(),
            "iat": 0,
            "exp": 4_102_444_800i64,
            "iss": "hamperhouse-auth",
            "aud": "hamperhouse-api",
        }))
        .expect("claims should deserialize without role/email");
        assert_eq!(claims.role, Role::Customer);
        assert!(claims.email.is_none());
    }

    #[test]
    fn admin_role_round_trips() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::Admin);
    }
}

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use crate::domain::Principal;
use crate::errors::AppError;
use crate::state::AppState;

/// Caller identity taken from an `Authorization: Bearer <token>` header.
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let principal = state.tokens.verify(token).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized
        })?;

        Ok(AuthUser(principal))
    }
}

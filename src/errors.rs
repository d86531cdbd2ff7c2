use axum::http::StatusCode;
use axum::response::IntoResponse;
use thiserror::Error;

use crate::services::auth_service::AuthError;
use crate::services::job_registry::SchedulerError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Store(StoreError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Scheduler error: {0}")]
    Scheduler(SchedulerError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            AppError::Scheduler(SchedulerError::ShutDown) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Shutting down").into_response()
            }
            AppError::Scheduler(_) | AppError::Store(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::AlreadyExists(_) => AppError::Conflict(value.to_string()),
            StoreError::NotFound(_) => AppError::NotFound,
            other => AppError::Store(other),
        }
    }
}

impl From<SchedulerError> for AppError {
    fn from(value: SchedulerError) -> Self {
        match value {
            SchedulerError::InvalidPeriod(_) => AppError::Validation(value.to_string()),
            other => AppError::Scheduler(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidToken(_) => AppError::Unauthorized,
            AuthError::Hashing(msg) => AppError::Internal(msg),
        }
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        AppError::Validation(value)
    }
}

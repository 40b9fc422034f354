use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Delivery is not available in your location.")]
    NoZoneMatch,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("This order has already been delivered.")]
    AlreadyDelivered,

    #[error("Invalid delivery code.")]
    InvalidCode,

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("You do not have permission to access this resource.")]
    Forbidden,

    #[error("Too many verification attempts. Please try again later.")]
    RateLimited,

    #[error("storage temporarily unavailable, retry the request")]
    StorageUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) | AppError::NoZoneMatch | AppError::InvalidCode => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyDelivered | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

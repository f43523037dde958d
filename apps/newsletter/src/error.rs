use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use email::{EmailError, NewsletterError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<NewsletterError> for ApiError {
    fn from(err: NewsletterError) -> Self {
        match err {
            NewsletterError::Unauthorized => ApiError::Unauthorized,
            NewsletterError::Validation(msg) => ApiError::BadRequest(msg),
            NewsletterError::Email(EmailError::Validation(msg)) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Unauthorized => {
                tracing::info!("Unauthorized newsletter request");
                (
                    StatusCode::UNAUTHORIZED,
                    "Unauthorized",
                    "Admin token required".to_string(),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::info!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    msg,
                )
            }
        };

        (
            status,
            Json(json!({
                "success": false,
                "error": error,
                "message": message,
            })),
        )
            .into_response()
    }
}

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum ClarityError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing userId")]
    MissingUserId,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("Invalid API key")]
    Unauthorized,

    #[error("Too many requests")]
    RateLimited,

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("FX payload malformed: {0}")]
    MalformedFxPayload(String),

    #[error("FX provider quota exhausted locally")]
    UpstreamThrottled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Invalid built-in seed data: {0}")]
    SeedData(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl ClarityError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ClarityError::Validation(msg.into())
    }

    /// Whether the failure came from the FX provider rather than from us.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ClarityError::Reqwest(_)
                | ClarityError::UpstreamStatus(_)
                | ClarityError::MalformedFxPayload(_)
                | ClarityError::UpstreamThrottled
        )
    }
}

impl From<figment::Error> for ClarityError {
    fn from(e: figment::Error) -> Self {
        ClarityError::Config(Box::new(e))
    }
}

impl IntoResponse for ClarityError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            ClarityError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("VALIDATION_ERROR", message),
            ),
            ClarityError::MissingUserId => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("MISSING_USER_ID", "Missing userId"),
            ),
            ClarityError::UserNotFound(_) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody::new("NOT_FOUND", "User not found"),
            ),
            ClarityError::SubscriptionNotFound(_) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody::new("NOT_FOUND", "Subscription not found"),
            ),
            ClarityError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody::new("UNAUTHORIZED", "Invalid API key"),
            ),
            ClarityError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorBody::new("RATE_LIMITED", "Too many requests"),
            ),
            ref e if e.is_upstream() => {
                error!(error = %e, "FX refresh failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorBody::new("FX_REFRESH_FAILED", "FX refresh failed"),
                )
            }
            ref e => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody::new("INTERNAL_ERROR", "An internal server error occurred."),
                )
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiErrorBody {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

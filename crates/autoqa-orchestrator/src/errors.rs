//! HTTP-facing error type, in the shape of `riptide-api::errors::ApiError`:
//! one enum, a status code and a stable `error_type` per variant, and an
//! `IntoResponse` impl that logs at a tier matched to the status class.

use autoqa_containers::ContainerError;
use autoqa_events::SubscribeError;
use autoqa_intelligence::IntelligenceError;
use autoqa_types::{BackpressureReason, ExecutionRequest, RequestValidationError, RetryAfter};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("execution {0} not found")]
    NotFound(Uuid),
    #[error("rate limited, {0}")]
    RateLimited(RetryAfter),
    #[error("provider circuit open: {0}")]
    CircuitOpen(String),
    #[error("admission rejected: {0}")]
    QueueRejected(BackpressureReason),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("container error: {0}")]
    Container(String),
    #[error("subscription error: {0}")]
    Subscription(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::QueueRejected(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Container(_) => StatusCode::BAD_GATEWAY,
            ApiError::Subscription(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::RateLimited(_) => "rate_limited",
            ApiError::CircuitOpen(_) => "circuit_open",
            ApiError::QueueRejected(_) => "queue_rejected",
            ApiError::Provider(_) => "provider_error",
            ApiError::Container(_) => "container_error",
            ApiError::Subscription(_) => "subscription_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited(_)
                | ApiError::CircuitOpen(_)
                | ApiError::QueueRejected(_)
                | ApiError::Provider(_)
                | ApiError::Container(_)
        )
    }
}

impl From<RequestValidationError> for ApiError {
    fn from(err: RequestValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ContainerError> for ApiError {
    fn from(err: ContainerError) -> Self {
        ApiError::Container(err.to_string())
    }
}

impl From<SubscribeError> for ApiError {
    fn from(err: SubscribeError) -> Self {
        ApiError::Subscription(err.to_string())
    }
}

impl From<IntelligenceError> for ApiError {
    fn from(err: IntelligenceError) -> Self {
        match err {
            IntelligenceError::RateLimited(retry_after) => ApiError::RateLimited(retry_after),
            IntelligenceError::CircuitOpen { provider } => ApiError::CircuitOpen(provider),
            other => ApiError::Provider(other.to_string()),
        }
    }
}

/// Used by `submit` to report why admission failed without exposing
/// `ExecutionRequest` past the API boundary.
pub fn admission_rejected(reason: BackpressureReason, _request: &ExecutionRequest) -> ApiError {
    ApiError::QueueRejected(reason)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }
        let body = Json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.to_string(),
                "retryable": self.is_retryable(),
                "status": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}

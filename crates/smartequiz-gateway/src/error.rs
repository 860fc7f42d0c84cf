//! Error types for the tenant API gateway.

use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Gateway error variants.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Unknown, malformed, or revoked API key. Never retried by the gateway.
    #[error("Invalid API key")]
    Authentication,

    #[error("API key scope does not permit this operation: {required}")]
    Authorization { required: String },

    #[error("Client IP {ip} is not in the key's allowlist")]
    IpNotAllowed { ip: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded {
        limit: u32,
        retry_after_secs: i64,
        reset_at: DateTime<Utc>,
    },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("SSRF protection: {0}")]
    SsrfDetected(String),

    #[error("Unknown scope: {0}")]
    UnknownScope(String),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Webhook limit ({limit}) reached for tenant")]
    WebhookLimitExceeded { limit: usize },

    #[error("API key not found")]
    KeyNotFound,

    #[error("Webhook not found")]
    WebhookNotFound,

    #[error("Delivery not found")]
    DeliveryNotFound,

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON error response returned by gateway API endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::RateLimitExceeded {
            limit,
            retry_after_secs,
            reset_at,
        } = &self
        {
            return rate_limited_response(*limit, *retry_after_secs, *reset_at);
        }

        let (status, error_type) = match &self {
            GatewayError::Authentication => (StatusCode::UNAUTHORIZED, "unauthorized"),
            GatewayError::Authorization { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            GatewayError::IpNotAllowed { .. } => (StatusCode::FORBIDDEN, "ip_not_allowed"),
            GatewayError::RateLimitExceeded { .. } => unreachable!(),
            GatewayError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            GatewayError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "invalid_url"),
            GatewayError::SsrfDetected(_) => (StatusCode::BAD_REQUEST, "ssrf_detected"),
            GatewayError::UnknownScope(_) => (StatusCode::BAD_REQUEST, "unknown_scope"),
            GatewayError::UnknownEventType(_) => (StatusCode::BAD_REQUEST, "unknown_event_type"),
            GatewayError::WebhookLimitExceeded { .. } => {
                (StatusCode::CONFLICT, "webhook_limit_exceeded")
            }
            GatewayError::KeyNotFound => (StatusCode::NOT_FOUND, "key_not_found"),
            GatewayError::WebhookNotFound => (StatusCode::NOT_FOUND, "webhook_not_found"),
            GatewayError::DeliveryNotFound => (StatusCode::NOT_FOUND, "delivery_not_found"),
            GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Build the 429 response carrying `Retry-After` and the rate-limit header trio.
fn rate_limited_response(limit: u32, retry_after_secs: i64, reset_at: DateTime<Utc>) -> Response {
    let body = ErrorResponse {
        error: "rate_limit_exceeded".to_string(),
        message: "API key rate limit exceeded. Please wait before trying again.".to_string(),
        status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    let headers = response.headers_mut();

    if let Ok(v) = retry_after_secs.max(1).to_string().parse() {
        headers.insert(header::RETRY_AFTER, v);
    }
    if let Ok(v) = limit.to_string().parse() {
        headers.insert(HeaderName::from_static("x-ratelimit-limit"), v);
    }
    if let Ok(v) = "0".parse() {
        headers.insert(HeaderName::from_static("x-ratelimit-remaining"), v);
    }
    if let Ok(v) = reset_at.timestamp_millis().to_string().parse() {
        headers.insert(HeaderName::from_static("x-ratelimit-reset"), v);
    }

    response
}

pub type ApiResult<T> = Result<T, GatewayError>;

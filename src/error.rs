//! Gateway-wide error type and its mapping to the response envelope.
//!
//! Every error that reaches a client passes through [`GatewayError::into_response`].
//! Internal errors between components stay typed; they are converted here and
//! nowhere else, per the single-envelope rule.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Stable machine-readable error codes, per the external interface contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    RateLimitExceeded,
    ProxyError,
    NotFound,
    Unauthorized,
    Forbidden,
    ValidationError,
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::ProxyError => "PROXY_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::ProxyError => StatusCode::BAD_GATEWAY,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error kinds named in the error-handling design: each maps to exactly one
/// client-facing code, but carries component-specific context for logging.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("coordination store unavailable: {0}")]
    Coordination(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("circuit open, retry after {retry_after_ms}ms")]
    Breaker { retry_after_ms: u64 },

    #[error("rate limit exceeded")]
    RateLimit {
        limit: u64,
        remaining: u64,
        reset_at: u64,
        retry_after: u64,
    },

    #[error("no route matched")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Unknown(String),
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: String,
    code: &'static str,
    #[serde(rename = "statusCode")]
    status_code: u16,
    #[serde(rename = "requestId")]
    request_id: String,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Configuration(_) => ErrorCode::ConfigurationError,
            GatewayError::Coordination(_) => ErrorCode::InternalError,
            GatewayError::Upstream(_) => ErrorCode::ProxyError,
            GatewayError::Breaker { .. } => ErrorCode::ProxyError,
            GatewayError::RateLimit { .. } => ErrorCode::RateLimitExceeded,
            GatewayError::NotFound => ErrorCode::NotFound,
            GatewayError::Unauthorized => ErrorCode::Unauthorized,
            GatewayError::Forbidden => ErrorCode::Forbidden,
            GatewayError::Validation(_) => ErrorCode::ValidationError,
            GatewayError::Unknown(_) => ErrorCode::InternalError,
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GatewayError::Breaker { retry_after_ms } => Some((retry_after_ms + 999) / 1000),
            GatewayError::RateLimit { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Render this error into a client-facing response, tagging it with a
    /// request id so logs and the response body can be correlated.
    pub fn into_response_with_id(self, request_id: &str, redact: bool) -> Response {
        let code = self.code();
        let status = code.status();
        let retry_after = self.retry_after_secs();

        let message = if redact && matches!(self, GatewayError::Unknown(_) | GatewayError::Upstream(_)) {
            "an internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let envelope = ErrorEnvelope {
            error: message,
            code: code.as_str(),
            status_code: status.as_u16(),
            request_id: request_id.to_string(),
            retry_after,
            details: None,
        };

        let mut response = (status, Json(envelope)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        if let GatewayError::RateLimit { limit, remaining, reset_at, .. } = &self {
            insert_rate_limit_headers(response.headers_mut(), *limit, *remaining, *reset_at);
        }
        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let id = Uuid::new_v4().to_string();
        self.into_response_with_id(&id, true)
    }
}

/// Stamps `X-RateLimit-*` on any response whose request passed through C2,
/// allowed or denied (§6: "on every response the engine ran for").
pub fn insert_rate_limit_headers(headers: &mut axum::http::HeaderMap, limit: u64, remaining: u64, reset_at: u64) {
    for (name, value) in [
        ("X-RateLimit-Limit", limit.to_string()),
        ("X-RateLimit-Remaining", remaining.to_string()),
        ("X-RateLimit-Reset", reset_at.to_string()),
    ] {
        if let Ok(value) = axum::http::HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

//! HTTP Error Handling

use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::{RelayError, UpstreamErrorKind};

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 错误码定义（与 HTTP 状态码一致）
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;
    pub const TOO_MANY_REQUESTS: i32 = 429;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const BAD_GATEWAY: i32 = 502;
    pub const GATEWAY_TIMEOUT: i32 = 504;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    TooManyRequests { message: String, retry_after_secs: u64 },
    Internal(String),
    BadGateway(String),
    GatewayTimeout(String),
}

impl ApiError {
    fn status_and_errno(&self) -> (StatusCode, i32) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, errno::BAD_REQUEST),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, errno::NOT_FOUND),
            ApiError::TooManyRequests { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, errno::TOO_MANY_REQUESTS)
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, errno::INTERNAL_ERROR),
            ApiError::BadGateway(_) => (StatusCode::BAD_GATEWAY, errno::BAD_GATEWAY),
            ApiError::GatewayTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, errno::GATEWAY_TIMEOUT),
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Internal(msg)
            | ApiError::BadGateway(msg)
            | ApiError::GatewayTimeout(msg) => msg,
            ApiError::TooManyRequests { message, .. } => message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_errno();
        let body = ErrorResponse::new(code, self.message());

        if status.is_server_error() {
            tracing::error!(errno = code, error = %body.error, "Request failed");
        } else {
            tracing::warn!(errno = code, error = %body.error, "Request rejected");
        }

        match self {
            ApiError::TooManyRequests {
                retry_after_secs, ..
            } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                Json(body),
            )
                .into_response(),
            _ => (status, Json(body)).into_response(),
        }
    }
}

/// 上游配额耗尽时建议的重试等待（秒）
const UPSTREAM_QUOTA_RETRY_SECS: u64 = 5;

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        let message = e.to_string();
        match e {
            RelayError::InvalidRequest(_) => ApiError::BadRequest(message),
            RelayError::RateLimited { retry_after } => ApiError::TooManyRequests {
                message,
                retry_after_secs: retry_after.as_secs().max(1),
            },
            RelayError::Upstream { exhausted: true, .. } => ApiError::TooManyRequests {
                message,
                retry_after_secs: UPSTREAM_QUOTA_RETRY_SECS,
            },
            RelayError::Upstream { source, .. } if source.kind == UpstreamErrorKind::Timeout => {
                ApiError::GatewayTimeout(message)
            }
            RelayError::Upstream { .. } => ApiError::BadGateway(message),
            RelayError::NotFound(_) => ApiError::NotFound(message),
            RelayError::Transcode(_) | RelayError::Internal(_) => ApiError::Internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

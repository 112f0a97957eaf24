//! The stable error envelope every failure is converted into at the
//! boundary: `{"error": {"message": ..., "type": ...}}`.
//!
//! Messages are sanitized classification-appropriate text; raw upstream
//! bodies and internal errors only ever reach the log.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::AuthError;
use crate::db::DbError;
use crate::dispatch::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyErrorType {
    InvalidRequestError,
    AuthenticationError,
    RateLimitError,
    ApiError,
}

impl ProxyErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyErrorType::InvalidRequestError => "invalid_request_error",
            ProxyErrorType::AuthenticationError => "authentication_error",
            ProxyErrorType::RateLimitError => "rate_limit_error",
            ProxyErrorType::ApiError => "api_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: ProxyErrorType,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug)]
pub struct ProxyError {
    pub status: StatusCode,
    pub error_type: ProxyErrorType,
    pub message: String,
}

impl ProxyError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error_type: ProxyErrorType::InvalidRequestError,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error_type: ProxyErrorType::InvalidRequestError,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error_type: ProxyErrorType::ApiError,
            message: "internal error".to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            error: ErrorBody {
                message: self.message,
                error_type: self.error_type,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for ProxyError {
    fn from(err: AuthError) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error_type: ProxyErrorType::AuthenticationError,
            message: err.to_string(),
        }
    }
}

impl From<DbError> for ProxyError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => ProxyError::not_found("not found"),
            DbError::Conflict(message) => Self {
                status: StatusCode::CONFLICT,
                error_type: ProxyErrorType::InvalidRequestError,
                message,
            },
            DbError::Validation(message) => ProxyError::invalid_request(message),
            other => {
                tracing::error!(error = %other, "storage failure");
                ProxyError::internal()
            }
        }
    }
}

impl From<DispatchError> for ProxyError {
    fn from(err: DispatchError) -> Self {
        match &err {
            DispatchError::MissingModel
            | DispatchError::ModelNotAvailable { .. }
            | DispatchError::NoCandidate { .. } => ProxyError::invalid_request(err.to_string()),

            // Terminal stops are always non-retryable 4xx: the request is bad
            DispatchError::Terminal { .. } => ProxyError::invalid_request(err.to_string()),

            DispatchError::Exhausted { last_status, .. } => {
                let (status, error_type) = match last_status {
                    Some(401) | Some(402) | Some(403) => (
                        StatusCode::UNAUTHORIZED,
                        ProxyErrorType::AuthenticationError,
                    ),
                    Some(408) => (StatusCode::REQUEST_TIMEOUT, ProxyErrorType::ApiError),
                    Some(429) => (
                        StatusCode::TOO_MANY_REQUESTS,
                        ProxyErrorType::RateLimitError,
                    ),
                    _ => (StatusCode::BAD_GATEWAY, ProxyErrorType::ApiError),
                };
                Self {
                    status,
                    error_type,
                    message: err.to_string(),
                }
            }

            DispatchError::Internal(detail) => {
                tracing::error!(error = %detail, "dispatch failure");
                ProxyError::internal()
            }
        }
    }
}

/// Fallback for every unmatched method and path under the app.
pub async fn unknown_endpoint() -> ProxyError {
    ProxyError {
        status: StatusCode::NOT_FOUND,
        error_type: ProxyErrorType::InvalidRequestError,
        message: "Unknown API endpoint".to_string(),
    }
}

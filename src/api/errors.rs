use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Wire shape for every error. `code` is a stable machine-readable refusal
/// reason; `detail` is for humans and may change wording freely.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    code: &'static str,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden { code: &'static str, detail: String },
    BadRequest { code: &'static str, detail: String },
    NotFound { code: &'static str, detail: String },
    Conflict { code: &'static str, detail: String },
    TooManyRequests(&'static str),
    #[allow(dead_code)]
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    pub(crate) fn bad_request(code: &'static str, detail: impl Into<String>) -> Self {
        Self::BadRequest { code, detail: detail.into() }
    }

    pub(crate) fn not_found(code: &'static str, detail: impl Into<String>) -> Self {
        Self::NotFound { code, detail: detail.into() }
    }

    pub(crate) fn conflict(code: &'static str, detail: impl Into<String>) -> Self {
        Self::Conflict { code, detail: detail.into() }
    }

    pub(crate) fn forbidden(code: &'static str, detail: impl Into<String>) -> Self {
        Self::Forbidden { code, detail: detail.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let status = StatusCode::UNAUTHORIZED;
                let mut response = (
                    status,
                    Json(ErrorResponse {
                        status: status.as_u16(),
                        code: "unauthorized",
                        detail: message.to_string(),
                    }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden { code, detail } => {
                let status = StatusCode::FORBIDDEN;
                (status, Json(ErrorResponse { status: status.as_u16(), code, detail }))
                    .into_response()
            }
            ApiError::BadRequest { code, detail } => {
                let status = StatusCode::BAD_REQUEST;
                (status, Json(ErrorResponse { status: status.as_u16(), code, detail }))
                    .into_response()
            }
            ApiError::NotFound { code, detail } => {
                let status = StatusCode::NOT_FOUND;
                (status, Json(ErrorResponse { status: status.as_u16(), code, detail }))
                    .into_response()
            }
            ApiError::Conflict { code, detail } => {
                let status = StatusCode::CONFLICT;
                (status, Json(ErrorResponse { status: status.as_u16(), code, detail }))
                    .into_response()
            }
            ApiError::TooManyRequests(message) => {
                let status = StatusCode::TOO_MANY_REQUESTS;
                (
                    status,
                    Json(ErrorResponse {
                        status: status.as_u16(),
                        code: "rate_limited",
                        detail: message.to_string(),
                    }),
                )
                    .into_response()
            }
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                let status = StatusCode::SERVICE_UNAVAILABLE;
                (
                    status,
                    Json(ErrorResponse {
                        status: status.as_u16(),
                        code: "service_unavailable",
                        detail: message,
                    }),
                )
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (
                    status,
                    Json(ErrorResponse {
                        status: status.as_u16(),
                        code: "internal_error",
                        detail: message,
                    }),
                )
                    .into_response()
            }
        }
    }
}

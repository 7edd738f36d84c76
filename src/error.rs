//! Error types for coinscout.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for coinscout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message returned to callers for every upstream failure. The detail is logged only.
pub const UPSTREAM_ERROR_MESSAGE: &str = "Failed to get a response from the analysis service";

/// Main error type for coinscout.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required request field is missing, empty, or the body is not JSON.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Network failure, timeout, or non-2xx status from an upstream.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream answered, but not in the expected shape.
    #[error("Unexpected upstream response: {0}")]
    ResponseFormat(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::UpstreamUnavailable(_)
            | Error::ResponseFormat(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "invalid_request_error",
            Error::UpstreamUnavailable(_) | Error::ResponseFormat(_) => "upstream_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Text safe to show the caller. Only validation errors are relayed verbatim.
    fn public_message(&self) -> String {
        match self {
            Error::BadRequest(message) => message.clone(),
            Error::UpstreamUnavailable(_) | Error::ResponseFormat(_) => {
                UPSTREAM_ERROR_MESSAGE.to_string()
            }
            Error::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = serde_json::json!({
            "error": {
                "message": self.public_message(),
                "type": self.error_type(),
                "code": status.as_u16()
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

//! Unified error handling for the HTTP surface.

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fluffd_commands::DispatchError;
use serde::Serialize;

/// Error body `{"status": "error", "message": ...}` with an HTTP status.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub message: String,
    /// HTTP status code.
    #[serde(skip)]
    pub status: StatusCode,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// Bad request (400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    /// Not found (404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    /// Internal server error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// A device operation outlived its budget. Reported as 500.
    pub fn timeout(operation: &str, limit: Duration) -> Self {
        Self::internal(format!(
            "{} timed out after {}s",
            operation,
            limit.as_secs()
        ))
    }

    /// Prefix the message, keeping the status.
    pub fn context(mut self, prefix: &str) -> Self {
        self.message = format!("{}: {}", prefix, self.message);
        self
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "message": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ErrorResponse {}

impl From<DispatchError> for ErrorResponse {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::TargetNotFound(_) | DispatchError::NoDevicesConnected => {
                Self::bad_request(e.to_string())
            }
            DispatchError::Failed(_) => Self::internal(e.to_string()),
        }
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ErrorResponse>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_status() {
        let err: ErrorResponse = DispatchError::NoDevicesConnected.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Error: No Furbys connected for broadcast.");

        let err: ErrorResponse = DispatchError::TargetNotFound("AA".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ErrorResponse = DispatchError::Failed("boom".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_timeout_message() {
        let err = ErrorResponse::timeout("Command", Duration::from_secs(45))
            .context("Command timed out or failed");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.message,
            "Command timed out or failed: Command timed out after 45s"
        );
    }
}

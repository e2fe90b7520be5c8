// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

use super::envelope::Envelope;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Handler error carrying the HTTP status it maps to
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Request input echoed back in the envelope body
    pub body: serde_json::Value,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: serde_json::Value::Null,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Attach the request input the error refers to
    #[must_use]
    pub fn with_body(mut self, body: impl Into<serde_json::Value>) -> Self {
        self.body = body.into();
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(Envelope {
            status: status.as_u16(),
            body: self.body,
            errors: Some(self.message),
        });

        (status, body).into_response()
    }
}

/// Convert torch_core errors to HTTP errors
impl From<torch_core::Error> for AppError {
    fn from(err: torch_core::Error) -> Self {
        use torch_core::Error;

        match err {
            Error::NotFound(msg) => Self::not_found(msg),
            Error::Configuration(msg) => Self::bad_request(msg),
            Error::Exhausted { .. } => Self::not_found(err.to_string()),
            Error::Exec(_) | Error::Timeout(_) => {
                tracing::warn!("Resolution failed: {}", err);
                Self::internal_server_error(err.to_string())
            }
            Error::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                Self::internal_server_error("Identity store temporarily unavailable")
            }
            Error::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                Self::internal_server_error("Data processing error")
            }
            Error::Cluster(msg) | Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                Self::internal_server_error("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_status_mapping() {
        let not_found: AppError = torch_core::Error::NotFound("node da-9".into()).into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.message, "node da-9");

        let exec: AppError = torch_core::Error::Exec("container gone".into()).into();
        assert_eq!(exec.status, StatusCode::INTERNAL_SERVER_ERROR);

        let exhausted: AppError = torch_core::Error::Exhausted {
            node: "da-9".into(),
            attempts: 5,
        }
        .into();
        assert_eq!(exhausted.status, StatusCode::NOT_FOUND);
        assert!(exhausted.message.contains("5 attempt"));

        let internal: AppError = torch_core::Error::Internal("secret detail".into()).into();
        assert_eq!(internal.message, "Internal server error");
    }
}

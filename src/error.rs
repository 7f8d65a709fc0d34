//! Gym Error Types
//!
//! Error taxonomy shared by the registry, the command facade and the
//! HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors surfaced to callers of the gym API
#[derive(Error, Debug)]
pub enum GymError {
    /// Unknown instance identifier
    #[error("Instance_id {0} unknown")]
    NotFound(String),

    /// Bad environment id, malformed action, missing field, bad monitor options
    #[error("{0}")]
    InvalidArgument(String),

    /// Monitor state transition not allowed from the current state
    #[error("{0}")]
    Conflict(String),

    /// Results service rejected the credentials
    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GymError {
    /// Shorthand for a missing request field
    pub fn missing_field(field: &str) -> Self {
        GymError::InvalidArgument(format!(
            "A required request parameter was not provided: {}",
            field
        ))
    }

    /// Machine-readable kind reported alongside the message
    pub fn kind(&self) -> &'static str {
        match self {
            GymError::NotFound(_) => "not_found",
            GymError::InvalidArgument(_) => "invalid_argument",
            GymError::Conflict(_) => "conflict",
            GymError::Unauthorized(_) => "unauthorized",
            GymError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GymError::NotFound(_) => StatusCode::NOT_FOUND,
            GymError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            GymError::Conflict(_) => StatusCode::CONFLICT,
            GymError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GymError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for GymError {
    fn from(err: std::io::Error) -> Self {
        GymError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for GymError {
    fn from(err: serde_json::Error) -> Self {
        GymError::InvalidArgument(format!("Malformed JSON: {}", err))
    }
}

impl From<reqwest::Error> for GymError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            GymError::Unauthorized(err.to_string())
        } else {
            GymError::Internal(format!("Upload transport error: {}", err))
        }
    }
}

impl From<url::ParseError> for GymError {
    fn from(err: url::ParseError) -> Self {
        GymError::InvalidArgument(format!("Invalid URL: {}", err))
    }
}

impl IntoResponse for GymError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "message": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for gym operations
pub type GymResult<T> = Result<T, GymError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GymError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            GymError::InvalidArgument("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GymError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            GymError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = GymError::NotFound("3c657dbc".into());
        assert_eq!(err.to_string(), "Instance_id 3c657dbc unknown");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_missing_field() {
        let err = GymError::missing_field("action");
        assert!(matches!(err, GymError::InvalidArgument(_)));
        assert!(err.to_string().contains("action"));
    }
}

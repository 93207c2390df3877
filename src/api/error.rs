// src/api/error.rs
// Centralized error handling for HTTP API responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Standard API error response format
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
    pub error_code: Option<String>,
}

impl ApiError {
    /// Create a new internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            error_code: Some("INTERNAL_ERROR".to_string()),
        }
    }

    /// Create a new bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::BAD_REQUEST,
            error_code: Some("BAD_REQUEST".to_string()),
        }
    }

    /// Create a new not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::NOT_FOUND,
            error_code: Some("NOT_FOUND".to_string()),
        }
    }

    /// Create a new forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::FORBIDDEN,
            error_code: Some("FORBIDDEN".to_string()),
        }
    }

    /// Create a new conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::CONFLICT,
            error_code: Some("CONFLICT".to_string()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response_json = json!({
            "error": true,
            "message": self.message,
            "status": self.status_code.as_u16()
        });

        if let Some(error_code) = self.error_code {
            response_json["error_code"] = json!(error_code);
        }

        (self.status_code, Json(response_json)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_api_error_creation() {
        let error = ApiError::internal("Test error");
        assert_eq!(error.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, "Test error");
    }

    #[test]
    fn test_client_error_codes() {
        assert_eq!(ApiError::bad_request("x").status_code, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status_code, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::forbidden("x").status_code, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::conflict("x").status_code, StatusCode::CONFLICT);
    }
}

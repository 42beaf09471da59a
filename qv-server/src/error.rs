//! Error types for qv-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or unknown identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Role or ownership check failed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict with current record state (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<qv_common::Error> for ApiError {
    fn from(err: qv_common::Error) -> Self {
        use qv_common::Error;

        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::InvalidTransition(t) => ApiError::Conflict(t.to_string()),
            Error::Database(ref db_err)
                if db_err
                    .as_database_error()
                    .map(|e| e.is_unique_violation())
                    .unwrap_or(false) =>
            {
                ApiError::Conflict("Record already exists".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "The server could not complete the request".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use qv_common::approval::TransitionError;

    #[test]
    fn test_common_errors_map_to_status_codes() {
        let cases = [
            (qv_common::Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (qv_common::Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (qv_common::Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (qv_common::Error::Conflict("x".into()), StatusCode::CONFLICT),
            (
                qv_common::Error::InvalidTransition(TransitionError::Locked),
                StatusCode::CONFLICT,
            ),
            (qv_common::Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}

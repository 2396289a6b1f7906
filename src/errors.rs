use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    fn status_and_category(&self) -> (StatusCode, &'static str) {
        match self {
            Self::ValidationError(_) | Self::InvalidOperation(_) => {
                (StatusCode::BAD_REQUEST, "Bad Request")
            }
            Self::AuthError(_) | Self::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized")
            }
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            Self::DatabaseError(_) | Self::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, category) = self.status_and_category();

        // Storage errors carry internals (queries, constraint names); log them
        // and keep the wire message generic.
        let message = match &self {
            ServiceError::DatabaseError(err) => {
                tracing::error!(error = %err, "database error while handling request");
                "A storage error occurred".to_string()
            }
            ServiceError::InternalError(msg) => {
                tracing::error!(error = %msg, "internal error while handling request");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: category.to_string(),
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_and_category().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into())
                .status_and_category()
                .0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_and_category().0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Unauthorized("x".into())
                .status_and_category()
                .0,
            StatusCode::UNAUTHORIZED
        );
    }
}

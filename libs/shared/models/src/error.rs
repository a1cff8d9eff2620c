use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Machine-readable tag for the booking UI (retry affordance vs. field error).
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "auth",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal",
            AppError::ValidationError(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::Configuration(_) => "configuration",
            AppError::Unavailable(_) => "data_unavailable",
            AppError::ExternalService(_) => "external_service",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Auth(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg)
            | AppError::ValidationError(msg)
            | AppError::Conflict(msg)
            | AppError::Configuration(msg)
            | AppError::Unavailable(msg)
            | AppError::ExternalService(msg) => msg.clone(),
        };

        tracing::error!("Error: {}: {}", status, message);

        let body = Json(json!({
            "error": message,
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

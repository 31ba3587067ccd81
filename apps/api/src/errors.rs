use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Corrupted taxonomy input: {0}")]
    CorruptedTaxonomyInput(String),

    #[error("Incomplete configuration: {0}")]
    IncompleteConfig(String),

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidArgument(_)
            | AppError::InvalidTemplate(_)
            | AppError::InvalidSchema(_)
            | AppError::CorruptedTaxonomyInput(_) => StatusCode::BAD_REQUEST,
            AppError::IncompleteConfig(_)
            | AppError::Generator(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AppError::InvalidTemplate(_) => "INVALID_TEMPLATE",
            AppError::InvalidSchema(_) => "INVALID_SCHEMA",
            AppError::CorruptedTaxonomyInput(_) => "CORRUPTED_TAXONOMY_INPUT",
            AppError::IncompleteConfig(_) => "INCOMPLETE_CONFIG",
            AppError::Generator(_) => "GENERATOR_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = match &self {
            AppError::NotFound(msg)
            | AppError::InvalidArgument(msg)
            | AppError::InvalidTemplate(msg)
            | AppError::InvalidSchema(msg)
            | AppError::CorruptedTaxonomyInput(msg) => msg.clone(),
            AppError::IncompleteConfig(msg) => {
                tracing::error!("Incomplete configuration: {msg}");
                msg.clone()
            }
            AppError::Generator(msg) => {
                tracing::error!("Generator error: {msg}");
                "The generation call failed".to_string()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                "A database error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

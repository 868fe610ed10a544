use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::orchestration::compile::CompileError;
use crate::orchestration::export::SaveError;
use crate::orchestration::generate::GenerationError;

/// HTTP-facing error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Save(#[from] SaveError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Generation(e) => match e {
                GenerationError::InvalidInput(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT", e.to_string())
                }
                GenerationError::InvalidProfileFormat => {
                    (StatusCode::BAD_REQUEST, "INVALID_PROFILE_FORMAT", e.to_string())
                }
                GenerationError::Remote(_) => {
                    (StatusCode::BAD_GATEWAY, "GENERATE_REMOTE_ERROR", e.to_string())
                }
                GenerationError::Network(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "NETWORK_ERROR", e.to_string())
                }
            },
            AppError::Compile(e) => match e {
                CompileError::Remote(_) => {
                    (StatusCode::BAD_GATEWAY, "COMPILE_REMOTE_ERROR", e.to_string())
                }
                CompileError::Network(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "NETWORK_ERROR", e.to_string())
                }
            },
            AppError::Save(e) => {
                tracing::error!("Save error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SAVE_ERROR",
                    "The artifact could not be saved".to_string(),
                )
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

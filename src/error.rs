use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ordering::OrderingError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Target section not found at the new index")]
    TargetNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// A change would leave the site without a homepage.
    #[error("{0}")]
    HomepageRequired(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::TargetNotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::HomepageRequired(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<OrderingError> for AppError {
    fn from(err: OrderingError) -> Self {
        match err {
            OrderingError::MissingItem => AppError::NotFound("Section"),
            OrderingError::MissingTarget(_) => AppError::TargetNotFound,
            OrderingError::NegativeIndex(_) | OrderingError::NotAPermutation => {
                AppError::Validation(err.to_string())
            }
        }
    }
}

/// Malformed or mistyped request bodies are reported like any other
/// validation failure.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// JSON error body shared by every handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details stay in the logs, not in the response body.
        let body = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "storage operation failed");
                ErrorResponse {
                    error: "Database error".to_string(),
                    message: None,
                }
            }
            other => ErrorResponse {
                error: other.to_string(),
                message: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

use axum::{
    response::{IntoResponse, Response},
    Json,
    http::StatusCode,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Datastore request failed: {0}")]
    Upstream(String),

    #[error("Could not read news store: {0}")]
    StorageRead(String),

    #[error("Could not write news store: {0}")]
    StorageWrite(String),

    #[error("Error parsing content: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Upstream(_)
            | AppError::StorageRead(_)
            | AppError::StorageWrite(_)
            | AppError::Parse(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Replaces the message while keeping the variant, so handlers can hide
    /// upstream detail behind a fixed client-facing string.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        match self {
            AppError::Validation(_) => AppError::Validation(message),
            AppError::NotFound(_) => AppError::NotFound(message),
            AppError::Upstream(_) => AppError::Upstream(message),
            AppError::StorageRead(_) => AppError::StorageRead(message),
            AppError::StorageWrite(_) => AppError::StorageWrite(message),
            AppError::Parse(_) => AppError::Parse(message),
            AppError::Config(_) => AppError::Config(message),
            AppError::Timeout(_) => AppError::Timeout(message),
        }
    }

    fn into_message(self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Upstream(msg)
            | AppError::StorageRead(msg)
            | AppError::StorageWrite(msg)
            | AppError::Parse(msg)
            | AppError::Config(msg)
            | AppError::Timeout(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.into_message(),
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Upstream(format!("request timed out: {}", err))
        } else {
            AppError::Upstream(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

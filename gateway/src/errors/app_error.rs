use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::videosdk::RoomError;

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum AppError {
    /// A credential or setting needed for this request is missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An upstream provider could not be reached in time
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    /// An upstream provider answered with a non-success status
    #[error("Upstream returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// An upstream provider answered with an unexpected body
    #[error("Unexpected upstream response: {0}")]
    Protocol(String),

    /// Request failed authenticity checks
    #[error("Request validation failed: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) | AppError::Protocol(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Remote { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Validation(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "Request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<RoomError> for AppError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::Configuration(msg) => AppError::Configuration(msg),
            RoomError::Unreachable(msg) => AppError::Unreachable(msg),
            RoomError::Remote { status, body } => AppError::Remote { status, body },
            RoomError::Protocol(msg) => AppError::Protocol(msg),
        }
    }
}

//! Maps core failures onto HTTP responses.

use as_core::AppError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Core(AppError),
    /// Request-level rejection that never reached the engine.
    Rejected(StatusCode, String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Rejected(StatusCode::BAD_REQUEST, msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(AppError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Core(AppError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Core(AppError::ShuttingDown) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Core(AppError::StorageWrite(_))
            | Self::Core(AppError::Transfer(_))
            | Self::Core(AppError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Rejected(status, _) => *status,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Core(err) => err.to_string(),
            Self::Rejected(_, msg) => msg.clone(),
        };

        if status.is_server_error() {
            tracing::warn!(%status, error = %message, "request failed");
        } else {
            tracing::debug!(%status, error = %message, "request rejected");
        }

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failure raised by a handler; rendered by the `IntoResponse` impl below.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("media upload failed: {0:#}")]
    UploadFailed(anyhow::Error),

    #[error("{0}")]
    Internal(String),

    #[error("persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    message: String,
    success: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UploadFailed(_) | ApiError::Internal(_) | ApiError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::InvalidInput(m)
            | ApiError::Conflict(m)
            | ApiError::PayloadTooLarge(m)
            | ApiError::Internal(m) => m.clone(),
            ApiError::UploadFailed(_) => "Failed to upload media".into(),
            ApiError::Persistence(_) => "Internal server error".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        }
        let body = ErrorBody {
            status: status.as_u16(),
            message: self.public_message(),
            success: false,
        };
        (status, Json(body)).into_response()
    }
}

//! Error types for the gallery server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::http::responses::ErrorResponse;

/// Errors raised while starting or running the server
#[derive(Error, Debug)]
pub enum Error {
    /// Binding or serving failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error
    #[error(transparent)]
    Core(#[from] gallery_core::Error),
}

/// Result type alias using the server's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Request-level failure, rendered as `{"message": ...}`
#[derive(Error, Debug)]
pub enum ApiError {
    /// Core library error (unknown exhibit, invalid request, ...)
    #[error(transparent)]
    Core(#[from] gallery_core::Error),

    /// No credentials, or a token that does not match
    #[error("authentication required")]
    Unauthorized,

    /// Authenticated but refused (XSRF check)
    #[error("{0}")]
    Forbidden(String),

    /// Another pull into the same working tree is still running
    #[error("a pull into the working tree of exhibit_id {0} is already in progress")]
    PullInProgress(i64),

    /// Unexpected server-side failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(gallery_core::Error::ExhibitNotFound(_)) => StatusCode::NOT_ACCEPTABLE,
            Self::Core(gallery_core::Error::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Self::Core(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PullInProgress(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (
            status,
            Json(ErrorResponse {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

//! Photo error taxonomy.
//!
//! Four stable codes that the HTTP layer maps to status codes. Anything that
//! is not a format, size, or quota problem is `ProcessingFailed`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Photo pipeline errors.
#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("unsupported image format: {mime}")]
    InvalidFormat { mime: String },

    #[error("image too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("image processing failed")]
    ProcessingFailed(#[source] anyhow::Error),

    #[error("photo quota exceeded: {existing} stored + {incoming} incoming > {max}")]
    QuotaExceeded {
        existing: usize,
        incoming: usize,
        max: usize,
    },
}

impl PhotoError {
    /// Wrap any error as `ProcessingFailed`.
    pub fn processing(err: impl Into<anyhow::Error>) -> Self {
        PhotoError::ProcessingFailed(err.into())
    }

    /// Stable error code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            PhotoError::InvalidFormat { .. } => "IMG_001",
            PhotoError::TooLarge { .. } => "IMG_002",
            PhotoError::ProcessingFailed(_) => "IMG_003",
            PhotoError::QuotaExceeded { .. } => "IMG_004",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            PhotoError::InvalidFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PhotoError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PhotoError::ProcessingFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PhotoError::QuotaExceeded { .. } => StatusCode::CONFLICT,
        }
    }
}

/// A photo error tagged with the batch position that caused it.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct BatchError {
    /// Submission index of the failing file, if the failure was per-file.
    pub index: Option<usize>,
    #[source]
    pub source: PhotoError,
}

impl BatchError {
    /// Error not tied to a particular file.
    pub fn batch(source: PhotoError) -> Self {
        Self {
            index: None,
            source,
        }
    }

    /// Error raised while handling the file at `index`.
    pub fn at(index: usize, source: PhotoError) -> Self {
        Self {
            index: Some(index),
            source,
        }
    }
}

impl From<PhotoError> for BatchError {
    fn from(source: PhotoError) -> Self {
        Self::batch(source)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
}

impl IntoResponse for BatchError {
    fn into_response(self) -> Response {
        let status = self.source.status();

        // Internal causes are logged, never echoed to the client
        if let PhotoError::ProcessingFailed(cause) = &self.source {
            tracing::warn!(error = ?cause, index = ?self.index, "photo processing failed");
        }

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.source.code(),
                message: self.source.to_string(),
                index: self.index,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for PhotoError {
    fn into_response(self) -> Response {
        BatchError::batch(self).into_response()
    }
}

/// Result type alias using PhotoError.
pub type PhotoResult<T> = Result<T, PhotoError>;

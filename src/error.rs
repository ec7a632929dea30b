use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a source into a decoded image
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read image from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid image URL {0}: expected http:// or https://")]
    InvalidUrl(String),

    #[error("Failed to fetch image from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: ureq::Error,
    },

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
}

/// Failure to write the processed image
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("No processed image to save")]
    NoImage,

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error("No image loaded")]
    NotLoaded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Load(LoadError::TooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE")
            }
            AppError::Load(_) => (StatusCode::UNPROCESSABLE_ENTITY, "LOAD_ERROR"),
            AppError::Save(SaveError::NoImage) => (StatusCode::CONFLICT, "NO_IMAGE"),
            AppError::Save(SaveError::UnsupportedFormat(_)) => {
                (StatusCode::BAD_REQUEST, "SAVE_ERROR")
            }
            AppError::Save(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SAVE_ERROR"),
            AppError::NotLoaded => (StatusCode::NOT_FOUND, "NO_IMAGE"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Every action error ends here, so this is the one place it gets logged
        match &self {
            AppError::NotLoaded => tracing::debug!("{}", self),
            _ => tracing::error!("{}", self),
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

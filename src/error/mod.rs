//! Error handling module for rangecrop

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Infrastructure error type for adapters and the application edge
#[derive(Error, Debug)]
pub enum RangeCropError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session or API payload could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP call to the captioning service failed
    #[error("HTTP error: {message}")]
    Http { status: Option<u16>, message: String },

    /// FFmpeg library error
    #[error("FFmpeg error: {0}")]
    FFmpeg(#[from] ffmpeg_next::Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Domain rule violation
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<RangeCropError> for DomainError {
    fn from(error: RangeCropError) -> Self {
        match error {
            RangeCropError::Domain(inner) => inner,
            RangeCropError::FFmpeg(e) => DomainError::Decode(e.to_string()),
            RangeCropError::Http { message, .. } => DomainError::Caption(message),
            RangeCropError::Toml(e) => DomainError::Config(e.to_string()),
            other => DomainError::Persistence(other.to_string()),
        }
    }
}

/// Result type alias for rangecrop operations
pub type RangeCropResult<T> = std::result::Result<T, RangeCropError>;

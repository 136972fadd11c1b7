// Domain errors - Error types for the domain layer

use std::fmt;

/// Domain-specific error types
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Bad range bounds, bad crop, bad argument
    Validation(String),
    /// Crop collapsed to zero width or height after clamping
    DegenerateCrop,
    /// No range with the given id
    RangeNotFound(String),
    /// Source file missing or decoder could not open it
    SourceUnavailable(String),
    /// Seek or read failure on an open decoder
    Decode(String),
    /// Transcoder exited non-zero or could not be spawned
    Transcode(String),
    /// Captioning model failure
    Caption(String),
    /// Session file could not be written
    Persistence(String),
    /// Configuration could not be loaded
    Config(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::Validation(msg) => write!(f, "Validation failed: {}", msg),
            DomainError::DegenerateCrop => write!(f, "Crop has no area after clamping"),
            DomainError::RangeNotFound(id) => write!(f, "Range not found: {}", id),
            DomainError::SourceUnavailable(msg) => write!(f, "Source unavailable: {}", msg),
            DomainError::Decode(msg) => write!(f, "Decode error: {}", msg),
            DomainError::Transcode(msg) => write!(f, "Transcode failed: {}", msg),
            DomainError::Caption(msg) => write!(f, "Caption error: {}", msg),
            DomainError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            DomainError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

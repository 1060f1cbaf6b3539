//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while selecting or probing media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("File extension {extension:?} not allowed (allowed: {allowed})")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("File size {size} exceeds maximum {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("No video file selected")]
    NoSource,

    #[error("Invalid segment: start {start:.2}s must be before end {end:.2}s")]
    InvalidSegment { start: f64, end: f64 },

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Errors caused by user input rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MediaError::FileNotFound(_)
                | MediaError::UnsupportedFormat { .. }
                | MediaError::FileTooLarge { .. }
                | MediaError::NoSource
                | MediaError::InvalidSegment { .. }
        )
    }
}

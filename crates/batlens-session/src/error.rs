//! Session error types.

use thiserror::Error;

use batlens_detector_client::DetectorError;
use batlens_media::MediaError;
use batlens_models::RequestId;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Raised before any network activity; never triggers fallback.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Analysis {0} is already in progress")]
    Busy(RequestId),

    #[error("Detection service unreachable: {0}")]
    Transport(String),

    #[error("Detection service rejected the request: {0}")]
    Application(String),

    #[error("Media error: {0}")]
    Media(MediaError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SessionError::Validation(_))
    }
}

impl From<MediaError> for SessionError {
    fn from(err: MediaError) -> Self {
        if err.is_validation() {
            SessionError::Validation(err.to_string())
        } else {
            SessionError::Media(err)
        }
    }
}

impl From<&DetectorError> for SessionError {
    fn from(err: &DetectorError) -> Self {
        match err {
            DetectorError::Application { .. } => SessionError::Application(err.to_string()),
            DetectorError::Io(e) => SessionError::Validation(format!("selected video cannot be read: {}", e)),
            DetectorError::Config(msg) => SessionError::Config(msg.clone()),
            _ => SessionError::Transport(err.to_string()),
        }
    }
}

//! Detector client error types.

use thiserror::Error;

pub type DetectorResult<T> = Result<T, DetectorError>;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detection service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Analysis rejected: {message}")]
    Application {
        message: String,
        errors: Vec<String>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectorError {
    /// Check if the request may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DetectorError::ServiceUnavailable(_) | DetectorError::Timeout(_) | DetectorError::Network(_)
        )
    }

    /// The service was reached and answered `success=false`.
    pub fn is_application(&self) -> bool {
        matches!(self, DetectorError::Application { .. })
    }

    /// The request never left this process: unreadable upload or bad endpoint.
    pub fn is_local(&self) -> bool {
        matches!(self, DetectorError::Io(_) | DetectorError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let io = DetectorError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io.is_local());
        assert!(!io.is_retryable());

        assert!(DetectorError::Config("bad url".into()).is_local());
        assert!(DetectorError::Timeout(5).is_retryable());
        assert!(!DetectorError::InvalidResponse("empty".into()).is_local());
        assert!(!DetectorError::InvalidResponse("empty".into()).is_retryable());
    }
}

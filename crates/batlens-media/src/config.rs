//! Media selection configuration.

use std::time::Duration;

/// Limits applied when a video is picked.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
    /// Lowercase extensions without the dot
    pub allowed_extensions: Vec<String>,
    /// Upper bound on metadata resolution
    pub metadata_timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024, // 100MB
            allowed_extensions: default_extensions(),
            metadata_timeout: Duration::from_secs(15),
        }
    }
}

fn default_extensions() -> Vec<String> {
    ["mp4", "avi", "mov", "mkv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl MediaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_file_size: std::env::var("BATLENS_MAX_FILE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024),
            allowed_extensions: std::env::var("BATLENS_ALLOWED_EXTENSIONS")
                .map(|s| {
                    s.split(',')
                        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                        .filter(|e| !e.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| default_extensions()),
            metadata_timeout: Duration::from_secs(
                std::env::var("BATLENS_METADATA_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
        }
    }

    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == ext)
    }
}

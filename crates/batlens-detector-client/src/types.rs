//! Detection service request types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default detection sensitivity sent with an upload.
pub const DEFAULT_UPLOAD_SENSITIVITY: f64 = 1.0;

/// Payload for `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeUpload {
    /// Local path of the video to upload
    pub video_path: PathBuf,
    /// File name reported to the service
    pub file_name: String,
    /// Segment start in seconds
    pub start_time: f64,
    /// Segment end in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// Detection sensitivity
    #[serde(default = "default_sensitivity")]
    pub upload_sensitivity: f64,
}

fn default_sensitivity() -> f64 {
    DEFAULT_UPLOAD_SENSITIVITY
}

impl AnalyzeUpload {
    pub fn new(video_path: impl Into<PathBuf>) -> Self {
        let video_path = video_path.into();
        let file_name = video_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video.mp4".to_string());

        Self {
            video_path,
            file_name,
            start_time: 0.0,
            end_time: None,
            upload_sensitivity: DEFAULT_UPLOAD_SENSITIVITY,
        }
    }

    pub fn with_range(mut self, start_time: f64, end_time: Option<f64>) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.upload_sensitivity = sensitivity;
        self
    }

    /// MIME type derived from the file extension.
    pub fn content_type(&self) -> &'static str {
        let ext = self
            .video_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "mp4" => "video/mp4",
            "mov" => "video/quicktime",
            "avi" => "video/x-msvideo",
            "mkv" => "video/x-matroska",
            "webm" => "video/webm",
            _ => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_defaults() {
        let upload = AnalyzeUpload::new("/videos/cave.MOV");
        assert_eq!(upload.file_name, "cave.MOV");
        assert_eq!(upload.upload_sensitivity, 1.0);
        assert_eq!(upload.content_type(), "video/quicktime");
    }

    #[test]
    fn test_unknown_extension() {
        let upload = AnalyzeUpload::new("clip.bin").with_range(1.0, Some(2.0));
        assert_eq!(upload.content_type(), "application/octet-stream");
        assert_eq!(upload.end_time, Some(2.0));
    }
}

//! Analysis result document.
//!
//! Field names follow the detection service's camelCase JSON so a document
//! received over the wire serializes back out unchanged.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Frame rate assumed when the service cannot report one.
pub const DEFAULT_FPS: f64 = 30.0;

/// A pixel coordinate in the source video.
///
/// The detector reports contour centres, so coordinates are fractional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A single detection: bounding box centre and size at a given frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Position {
    /// Frame index in the source video
    pub frame: u64,
    /// Centre x in pixels
    pub x: f64,
    /// Centre y in pixels
    pub y: f64,
    /// Bounding box width in pixels
    pub width: f64,
    /// Bounding box height in pixels
    pub height: f64,
    /// Wall-clock position (HH:MM:SS)
    pub timestamp: String,
}

impl Position {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Number of moving objects seen in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameMovement {
    pub frame: u64,
    pub count: u32,
}

/// Result document of a completed analysis, real or synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Frames processed within the segment
    pub total_frames: u64,

    /// Whether at least one bat was detected
    pub bat_detected: bool,

    /// Number of frames with a detection
    pub detection_count: u64,

    /// First detected position
    #[serde(default)]
    pub start_point: Option<Point>,

    /// Last detected position
    #[serde(default)]
    pub end_point: Option<Point>,

    /// Processing time (MM:SS)
    pub analysis_time: String,

    /// Frames per second of the analyzed video
    #[serde(default = "default_fps")]
    pub fps: f64,

    /// Duration of the analyzed video in seconds
    #[serde(default)]
    pub video_duration: f64,

    /// Detections, ordered by frame
    #[serde(default)]
    pub positions: Vec<Position>,

    /// Per-frame movement counts, ordered by frame
    #[serde(default)]
    pub movements_per_frame: Vec<FrameMovement>,
}

fn default_fps() -> f64 {
    DEFAULT_FPS
}

impl AnalysisResult {
    /// Check the frame ordering invariant of both series.
    pub fn is_frame_ordered(&self) -> bool {
        self.positions.windows(2).all(|w| w[0].frame < w[1].frame)
            && self
                .movements_per_frame
                .windows(2)
                .all(|w| w[0].frame < w[1].frame)
    }

    /// Recompute `start_point`/`end_point` from the positions series.
    pub fn with_endpoints_from_positions(mut self) -> Self {
        self.start_point = self.positions.first().map(Position::center);
        self.end_point = self.positions.last().map(Position::center);
        self
    }
}

/// Format elapsed seconds the way the detection service reports them (MM:SS).
pub fn format_elapsed(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Format a frame offset as the service's position timestamp (HH:MM:SS).
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE_DOCUMENT: &str = r#"{
        "totalFrames": 120,
        "batDetected": true,
        "detectionCount": 2,
        "startPoint": {"x": 10, "y": 20},
        "endPoint": null,
        "analysisTime": "00:03",
        "fps": 29.97,
        "videoDuration": 4.0,
        "positions": [
            {"frame": 3, "x": 10, "y": 20, "width": 4, "height": 5, "timestamp": "00:00:00"},
            {"frame": 9, "x": 12, "y": 22, "width": 4, "height": 5, "timestamp": "00:00:00"}
        ],
        "movementsPerFrame": [{"frame": 3, "count": 1}, {"frame": 4, "count": 0}]
    }"#;

    #[test]
    fn test_parse_service_document() {
        let result: AnalysisResult = serde_json::from_str(SERVICE_DOCUMENT).unwrap();
        assert_eq!(result.total_frames, 120);
        assert_eq!(result.start_point, Some(Point::new(10.0, 20.0)));
        assert_eq!(result.end_point, None);
        assert_eq!(result.positions.len(), 2);
        assert!(result.is_frame_ordered());
    }

    #[test]
    fn test_serializes_camel_case() {
        let result: AnalysisResult = serde_json::from_str(SERVICE_DOCUMENT).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"totalFrames\":120"));
        assert!(json.contains("\"movementsPerFrame\""));
    }

    #[test]
    fn test_missing_fps_uses_default() {
        let doc = r#"{"totalFrames":0,"batDetected":false,"detectionCount":0,"analysisTime":"00:00"}"#;
        let result: AnalysisResult = serde_json::from_str(doc).unwrap();
        assert_eq!(result.fps, DEFAULT_FPS);
        assert!(result.positions.is_empty());
    }

    #[test]
    fn test_unordered_frames_detected() {
        let mut result: AnalysisResult = serde_json::from_str(SERVICE_DOCUMENT).unwrap();
        result.positions.reverse();
        assert!(!result.is_frame_ordered());
    }

    #[test]
    fn test_parse_fractional_coordinates() {
        let doc = r#"{
            "totalFrames": 60,
            "batDetected": true,
            "detectionCount": 1,
            "startPoint": {"x": 101.5, "y": 48.25},
            "endPoint": {"x": 101.5, "y": 48.25},
            "analysisTime": "00:01",
            "fps": 30.0,
            "videoDuration": 2.0,
            "positions": [
                {"frame": 12, "x": 101.5, "y": 48.25, "width": 20.0, "height": 13.0, "timestamp": "00:00:00"}
            ],
            "movementsPerFrame": [{"frame": 12, "count": 1}]
        }"#;
        let result: AnalysisResult = serde_json::from_str(doc).unwrap();
        let position = &result.positions[0];
        assert_eq!(position.center(), Point::new(101.5, 48.25));
        assert_eq!(position.width, 20.0);
        assert_eq!(result.end_point, Some(Point::new(101.5, 48.25)));
    }

    #[test]
    fn test_endpoints_from_positions() {
        let result: AnalysisResult = serde_json::from_str(SERVICE_DOCUMENT).unwrap();
        let result = result.with_endpoints_from_positions();
        assert_eq!(result.start_point, Some(Point::new(10.0, 20.0)));
        assert_eq!(result.end_point, Some(Point::new(12.0, 22.0)));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_elapsed(125.7), "02:05");
        assert_eq!(format_timestamp(3725.0), "01:02:05");
        assert_eq!(format_timestamp(-1.0), "00:00:00");
    }
}

//! Result exports.
//!
//! Every export is synchronous and produces an in-memory [`ExportArtifact`];
//! [`ExportEngine::save`] writes it out.
//!
//! Known limitations:
//! - CSV fields are joined with commas without quoting, so a value that
//!   contains a comma or newline breaks the row structure.
//! - PDF export is a placeholder: a plain-text report carrying a `.pdf` name
//!   and `application/pdf` label, not a conformant PDF document.

use std::fmt::{self, Write as _};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use tracing::info;

use batlens_models::AnalysisResult;

use crate::error::{ReportError, ReportResult};
use crate::render::{summarize, ChartSurface};

const CSV_HEADER: &str = "frame,x,y,width,height,timestamp";

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
            ExportFormat::Png => "image/png",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "png" => Ok(ExportFormat::Png),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

/// An exported file held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Builds export artifacts sharing one file name stem.
#[derive(Debug, Clone)]
pub struct ExportEngine {
    stem: String,
}

impl Default for ExportEngine {
    fn default() -> Self {
        Self::timestamped(Utc::now())
    }
}

impl ExportEngine {
    pub fn new(stem: impl Into<String>) -> Self {
        Self { stem: stem.into() }
    }

    /// Stem of the form `bat_analysis_YYYYMMDD_HHMMSS`.
    pub fn timestamped(at: DateTime<Utc>) -> Self {
        Self::new(format!("bat_analysis_{}", at.format("%Y%m%d_%H%M%S")))
    }

    /// Export in `format`. `Ok(None)` when PNG is requested with no chart mounted.
    pub fn export(
        &self,
        format: ExportFormat,
        result: &AnalysisResult,
        surface: Option<&ChartSurface>,
    ) -> ReportResult<Option<ExportArtifact>> {
        match format {
            ExportFormat::Csv => Ok(Some(self.export_csv(result))),
            ExportFormat::Json => self.export_json(result).map(Some),
            ExportFormat::Png => self.export_png(surface),
            ExportFormat::Pdf => Ok(Some(self.export_pdf(result))),
        }
    }

    /// One row per position, in field order. Values are not quoted; whole
    /// coordinates print without a fractional part.
    pub fn export_csv(&self, result: &AnalysisResult) -> ExportArtifact {
        let mut out = String::with_capacity(CSV_HEADER.len() + 1 + result.positions.len() * 32);
        out.push_str(CSV_HEADER);
        out.push('\n');

        for p in &result.positions {
            let _ = writeln!(out, "{},{},{},{},{},{}", p.frame, p.x, p.y, p.width, p.height, p.timestamp);
        }

        self.artifact(ExportFormat::Csv, out.into_bytes())
    }

    pub fn export_json(&self, result: &AnalysisResult) -> ReportResult<ExportArtifact> {
        let bytes = serde_json::to_vec_pretty(result)?;
        Ok(self.artifact(ExportFormat::Json, bytes))
    }

    pub fn export_png(&self, surface: Option<&ChartSurface>) -> ReportResult<Option<ExportArtifact>> {
        let Some(surface) = surface else {
            return Ok(None);
        };

        let mut bytes = Vec::new();
        PngEncoder::new(Cursor::new(&mut bytes)).write_image(
            surface.image().as_raw(),
            surface.width(),
            surface.height(),
            ColorType::Rgb8,
        )?;

        Ok(Some(self.artifact(ExportFormat::Png, bytes)))
    }

    /// Placeholder: a text report labelled as PDF.
    pub fn export_pdf(&self, result: &AnalysisResult) -> ExportArtifact {
        let mut out = String::new();
        let _ = writeln!(out, "Bat Flight Analysis Report");
        let _ = writeln!(out, "==========================");
        let _ = writeln!(out, "Total Frames: {}", result.total_frames);
        let _ = writeln!(out, "Bat Detected: {}", if result.bat_detected { "yes" } else { "no" });
        let _ = writeln!(out, "Detections: {}", result.detection_count);
        let _ = writeln!(out, "Video Duration: {:.2} s", result.video_duration);
        let _ = writeln!(out, "FPS: {:.2}", result.fps);
        let _ = writeln!(out, "Analysis Time: {}", result.analysis_time);
        if let (Some(start), Some(end)) = (result.start_point, result.end_point) {
            let _ = writeln!(out, "Start Point: ({}, {})", start.x, start.y);
            let _ = writeln!(out, "End Point: ({}, {})", end.x, end.y);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", summarize(result));

        self.artifact(ExportFormat::Pdf, out.into_bytes())
    }

    /// Write `artifact` into `dir`, creating it if needed.
    pub fn save(&self, artifact: &ExportArtifact, dir: impl AsRef<Path>) -> ReportResult<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        if !dir.is_dir() {
            return Err(ReportError::OutputDir(dir.to_path_buf()));
        }

        let path = dir.join(&artifact.file_name);
        std::fs::write(&path, &artifact.bytes)?;
        info!("Exported {} ({} bytes)", path.display(), artifact.bytes.len());
        Ok(path)
    }

    fn artifact(&self, format: ExportFormat, bytes: Vec<u8>) -> ExportArtifact {
        ExportArtifact {
            file_name: format!("{}.{}", self.stem, format.extension()),
            content_type: format.content_type(),
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ChartRenderer;
    use batlens_models::{Point, Position};

    fn result() -> AnalysisResult {
        AnalysisResult {
            total_frames: 10,
            bat_detected: true,
            detection_count: 1,
            start_point: Some(Point::new(5.0, 6.0)),
            end_point: Some(Point::new(5.0, 6.0)),
            analysis_time: "00:03".to_string(),
            fps: 30.0,
            video_duration: 0.33,
            positions: vec![Position {
                frame: 1,
                x: 5.0,
                y: 6.0,
                width: 7.0,
                height: 8.0,
                timestamp: "00:00:00".to_string(),
            }],
            movements_per_frame: vec![],
        }
    }

    #[test]
    fn test_csv_header_and_row_in_field_order() {
        let artifact = ExportEngine::new("out").export_csv(&result());
        let text = String::from_utf8(artifact.bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines, vec!["frame,x,y,width,height,timestamp", "1,5,6,7,8,00:00:00"]);
        assert_eq!(artifact.file_name, "out.csv");
        assert_eq!(artifact.content_type, "text/csv");
    }

    #[test]
    fn test_csv_keeps_fractional_coordinates() {
        let mut r = result();
        r.positions[0].x = 101.5;
        r.positions[0].y = 48.25;
        r.positions[0].width = 20.0;
        let artifact = ExportEngine::new("out").export_csv(&r);
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert_eq!(text.lines().nth(1), Some("1,101.5,48.25,20,8,00:00:00"));
    }

    #[test]
    fn test_csv_does_not_quote() {
        let mut r = result();
        r.positions[0].timestamp = "a,b".to_string();
        let artifact = ExportEngine::new("out").export_csv(&r);
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert_eq!(text.lines().nth(1), Some("1,5,6,7,8,a,b"));
    }

    #[test]
    fn test_json_is_pretty_camel_case() {
        let artifact = ExportEngine::new("out").export_json(&result()).unwrap();
        let text = String::from_utf8(artifact.bytes.clone()).unwrap();
        assert!(text.contains("\n  \"totalFrames\": 10"));
        assert!(text.find("totalFrames") < text.find("movementsPerFrame"));

        let back: AnalysisResult = serde_json::from_slice(&artifact.bytes).unwrap();
        assert_eq!(back, result());
    }

    #[test]
    fn test_png_requires_mounted_surface() {
        let engine = ExportEngine::new("chart");
        assert!(engine.export_png(None).unwrap().is_none());

        let mut renderer = ChartRenderer::new(120, 120);
        renderer.render(&result());
        let artifact = engine.export_png(renderer.surface()).unwrap().unwrap();
        assert_eq!(&artifact.bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(artifact.content_type, "image/png");
    }

    #[test]
    fn test_pdf_is_labelled_text() {
        let artifact = ExportEngine::new("report").export_pdf(&result());
        assert_eq!(artifact.file_name, "report.pdf");
        assert_eq!(artifact.content_type, "application/pdf");
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.contains("Detections: 1"));
        assert!(text.contains("Total Points: 1"));
    }

    #[test]
    fn test_save_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ExportEngine::timestamped(DateTime::from_timestamp(0, 0).unwrap());
        let artifact = engine.export_csv(&result());

        let path = engine.save(&artifact, dir.path().join("exports")).unwrap();
        assert_eq!(path.file_name().unwrap(), "bat_analysis_19700101_000000.csv");
        assert_eq!(std::fs::read(&path).unwrap(), artifact.bytes);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert!("gif".parse::<ExportFormat>().is_err());
    }
}

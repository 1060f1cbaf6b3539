//! Result presentation for the batlens analysis pipeline.
//!
//! This crate provides:
//! - Chart series derivation and rasterization into a mounted chart surface
//! - Flight path statistics
//! - CSV, JSON, PNG and placeholder PDF exports

pub mod error;
pub mod export;
pub mod render;

pub use error::{ReportError, ReportResult};
pub use export::{ExportArtifact, ExportEngine, ExportFormat};
pub use render::{derive_series, summarize, BoundingBox, ChartRenderer, ChartSeries, ChartSurface, TrajectorySummary};

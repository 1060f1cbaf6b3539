//! Shared data models for the batlens analysis pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis result documents (positions, per-frame movement counts)
//! - Trim segments and request identifiers
//! - User-facing alert notifications
//! - Detection service wire envelopes

pub mod alert;
pub mod analysis;
pub mod request;
pub mod segment;
pub mod wire;

// Re-export common types
pub use alert::{AlertKind, AlertNotification};
pub use analysis::{AnalysisResult, FrameMovement, Point, Position};
pub use request::RequestId;
pub use segment::Segment;
pub use wire::{AnalyzeResponse, HealthResponse};

//! Media source selection, metadata probing and segment trimming.
//!
//! This crate provides:
//! - Source selection with upload validation and preview handle lifetime
//! - FFprobe-based duration resolution
//! - Segment bounds clamping and dispatch validation

pub mod config;
pub mod error;
pub mod preview;
pub mod probe;
pub mod segment;
pub mod source;

pub use config::MediaConfig;
pub use error::{MediaError, MediaResult};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use probe::{FfprobeMetadata, MetadataProbe};
pub use segment::SegmentSelector;
pub use source::{MediaSource, MediaSourceManager};

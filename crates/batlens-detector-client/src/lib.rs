//! Client for the remote bat-detection service.
//!
//! The detection algorithm itself lives behind an HTTP boundary. This crate
//! uploads a trimmed analysis request and maps the service envelope onto
//! transport and application failures so callers can decide on fallback.

pub mod client;
pub mod error;
pub mod service;
pub mod types;

pub use client::{DetectorClient, DetectorClientConfig};
pub use error::{DetectorError, DetectorResult};
pub use service::DetectionService;
pub use types::AnalyzeUpload;

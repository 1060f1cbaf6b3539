//! Detection service abstraction.

use async_trait::async_trait;

use batlens_models::{AnalysisResult, HealthResponse};

use crate::error::DetectorResult;
use crate::types::AnalyzeUpload;

/// Remote analysis boundary consumed by the orchestrator.
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Probe the service.
    async fn health(&self) -> DetectorResult<HealthResponse>;

    /// Analyze a video segment and return the result document.
    async fn analyze(&self, upload: &AnalyzeUpload) -> DetectorResult<AnalysisResult>;
}

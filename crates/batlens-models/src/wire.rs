//! Detection service response envelopes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::AnalysisResult;

/// Response of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Response of the health probe.
///
/// `/health` reports per-subsystem checks while the root endpoint only
/// returns a banner; both carry `status`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum HealthResponse {
    Detailed {
        status: String,
        #[serde(default)]
        checks: BTreeMap<String, bool>,
        timestamp: f64,
    },
    Banner {
        message: String,
        status: String,
        #[serde(default)]
        version: Option<String>,
    },
}

impl HealthResponse {
    pub fn status(&self) -> &str {
        match self {
            HealthResponse::Detailed { status, .. } | HealthResponse::Banner { status, .. } => status,
        }
    }

    /// `healthy` and `ok` count as healthy; `degraded` does not.
    pub fn is_healthy(&self) -> bool {
        matches!(self.status(), "healthy" | "ok")
    }

    /// Names of failing checks (detailed form only).
    pub fn failing_checks(&self) -> Vec<&str> {
        match self {
            HealthResponse::Detailed { checks, .. } => checks
                .iter()
                .filter(|(_, ok)| !**ok)
                .map(|(name, _)| name.as_str())
                .collect(),
            HealthResponse::Banner { .. } => Vec::new(),
        }
    }
}

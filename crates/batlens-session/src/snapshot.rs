//! Persisted session state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use batlens_models::{AlertNotification, AnalysisResult, RequestId, Segment};

use crate::error::{SessionError, SessionResult};
use crate::orchestrator::Phase;
use crate::settings::DEFAULT_SENSITIVITY;

/// Selected file as recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub path: PathBuf,
    pub duration: f64,
}

/// Everything needed to rebuild an [`crate::AnalysisSession`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default)]
    pub source: Option<SourceRecord>,
    #[serde(default)]
    pub segment: Segment,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    #[serde(default)]
    pub last_request_id: RequestId,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub result: Option<AnalysisResult>,
    #[serde(default)]
    pub last_alert: Option<AlertNotification>,
    pub updated_at: DateTime<Utc>,
}

fn default_sensitivity() -> f64 {
    DEFAULT_SENSITIVITY
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            source: None,
            segment: Segment::default(),
            sensitivity: DEFAULT_SENSITIVITY,
            last_request_id: RequestId::default(),
            phase: Phase::Idle,
            result: None,
            last_alert: None,
            updated_at: Utc::now(),
        }
    }
}

impl SessionSnapshot {
    /// Read a snapshot; a missing file yields a fresh session.
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at {}, starting fresh", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw)
            .map_err(|e| SessionError::Snapshot(format!("{}: {}", path.display(), e)))
    }

    /// Write the snapshot, replacing any previous file atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> SessionResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;

        debug!("Saved session to {}", path.display());
        Ok(())
    }
}

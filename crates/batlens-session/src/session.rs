//! Session facade tying media, segment, settings and dispatch together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use batlens_detector_client::DetectionService;
use batlens_media::{MediaResult, MediaSource, MediaSourceManager, SegmentSelector};
use batlens_models::{AlertNotification, AnalysisResult, Segment};

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::orchestrator::{AnalysisOrchestrator, AnalysisRequest, DispatchOutcome, Phase};
use crate::settings::{SensitivitySettingsStore, DEFAULT_SENSITIVITY};
use crate::snapshot::{SessionSnapshot, SourceRecord};

/// One user's analysis workflow.
pub struct AnalysisSession {
    media: MediaSourceManager,
    segment: SegmentSelector,
    settings: SensitivitySettingsStore,
    orchestrator: AnalysisOrchestrator,
    debounce: Duration,
}

impl AnalysisSession {
    pub fn new(config: &SessionConfig, media: MediaSourceManager, service: Arc<dyn DetectionService>) -> Self {
        Self {
            media,
            segment: SegmentSelector::new(),
            settings: SensitivitySettingsStore::new(DEFAULT_SENSITIVITY, config.debounce),
            orchestrator: AnalysisOrchestrator::new(config, service),
            debounce: config.debounce,
        }
    }

    /// Pick a new video and reset the segment to its full length.
    ///
    /// Any in-flight analysis is superseded. Returns the resolved duration,
    /// which is zero when the file exposes no metadata.
    pub async fn select_file(&mut self, path: impl AsRef<Path>) -> SessionResult<f64> {
        let file_name = match self.media.select(path.as_ref()) {
            Ok(source) => source.file_name.clone(),
            Err(e) => {
                self.orchestrator.notify(AlertNotification::warning(e.to_string()));
                return Err(e.into());
            }
        };

        self.orchestrator.invalidate();
        let duration = self.media.resolve_metadata().await;
        self.segment.reset(duration);

        if duration > 0.0 {
            self.orchestrator
                .notify(AlertNotification::info(format!("Loaded {} ({:.1}s)", file_name, duration)));
        } else {
            self.orchestrator.notify(AlertNotification::warning(format!(
                "Could not read metadata for {}; segment controls disabled",
                file_name
            )));
        }
        Ok(duration)
    }

    pub fn set_start(&mut self, t: f64) -> Segment {
        self.segment.set_start(t)
    }

    pub fn set_end(&mut self, t: f64) -> Segment {
        self.segment.set_end(t)
    }

    pub fn set_segment(&mut self, start: f64, end: f64) -> Segment {
        self.segment.set_start(start);
        self.segment.set_end(end)
    }

    /// Record a sensitivity change; returns the clamped pending value.
    pub fn set_sensitivity(&mut self, value: f64) -> f64 {
        self.settings.input(value)
    }

    /// Confirm analysis of the current segment.
    ///
    /// Pending sensitivity is committed first so the request carries the
    /// value the user last saw.
    pub async fn analyze(&mut self) -> SessionResult<DispatchOutcome> {
        let sensitivity = self.settings.flush();
        let request = AnalysisRequest::new(
            self.media.current().map(|s| s.path.clone()),
            self.segment.segment(),
            sensitivity,
        );
        self.orchestrator.dispatch(request).await
    }

    /// Whether the current selection would pass dispatch validation.
    pub fn ready(&self) -> MediaResult<Segment> {
        self.segment.validate(self.media.current().is_some())
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.media.current()
    }

    pub fn segment(&self) -> Segment {
        self.segment.segment()
    }

    pub fn segment_enabled(&self) -> bool {
        self.segment.is_enabled()
    }

    pub fn sensitivity(&self) -> f64 {
        self.settings.committed()
    }

    pub fn pending_sensitivity(&self) -> f64 {
        self.settings.pending()
    }

    pub fn settings(&self) -> &SensitivitySettingsStore {
        &self.settings
    }

    pub fn orchestrator(&self) -> &AnalysisOrchestrator {
        &self.orchestrator
    }

    pub fn phase(&self) -> Phase {
        self.orchestrator.phase()
    }

    pub fn result(&self) -> Option<AnalysisResult> {
        self.orchestrator.result()
    }

    pub fn last_alert(&self) -> Option<AlertNotification> {
        self.orchestrator.last_alert()
    }

    /// Capture the session, committing any pending sensitivity.
    pub fn snapshot(&mut self) -> SessionSnapshot {
        let sensitivity = self.settings.flush();
        SessionSnapshot {
            source: self.media.current().map(|s| SourceRecord {
                path: s.path.clone(),
                duration: s.duration,
            }),
            segment: self.segment.segment(),
            sensitivity,
            last_request_id: self.orchestrator.last_id(),
            phase: self.orchestrator.phase(),
            result: self.orchestrator.result(),
            last_alert: self.orchestrator.last_alert(),
            updated_at: chrono::Utc::now(),
        }
    }

    /// Rebuild state from a snapshot without probing the media again.
    ///
    /// A recorded file that no longer validates is dropped with a warning;
    /// the rest of the snapshot still applies.
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        self.media.teardown();
        self.segment.reset(0.0);

        if let Some(record) = &snapshot.source {
            match self.media.restore(&record.path, record.duration) {
                Ok(source) => {
                    let duration = source.duration;
                    self.segment.reset(duration);
                    self.segment.restore(snapshot.segment);
                }
                Err(e) => warn!("Dropping recorded source {}: {}", record.path.display(), e),
            }
        }

        self.settings = SensitivitySettingsStore::new(snapshot.sensitivity, self.debounce);
        self.orchestrator.restore(
            snapshot.phase,
            snapshot.last_request_id,
            snapshot.result,
            snapshot.last_alert,
        );
        info!(
            "Restored session (last request {}, phase {})",
            snapshot.last_request_id,
            self.orchestrator.phase().as_str()
        );
    }

    /// Release the source and supersede any in-flight analysis.
    pub fn teardown(&mut self) {
        self.orchestrator.invalidate();
        self.media.teardown();
        self.segment.reset(0.0);
    }
}

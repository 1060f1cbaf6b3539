//! Analysis dispatch state machine.
//!
//! [`OrchestratorState`] holds the transitions as plain methods that return
//! the [`Effect`]s to perform. [`AnalysisOrchestrator`] is the async driver
//! that executes them: it calls the detection service, waits out the
//! simulated fallback latency and publishes alerts. The state lock is never
//! held across an await; ordering between overlapping requests is decided
//! by request id alone.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use batlens_detector_client::{AnalyzeUpload, DetectionService, DetectorError};
use batlens_media::MediaError;
use batlens_models::{AlertKind, AlertNotification, AnalysisResult, RequestId, Segment};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::fallback::FallbackGenerator;

/// Dispatch lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Dispatching,
    Succeeded,
    Fallback,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Dispatching => "dispatching",
            Phase::Succeeded => "succeeded",
            Phase::Fallback => "fallback",
            Phase::Failed => "failed",
        }
    }

    /// Both real and synthesized results count as success for the caller.
    pub fn has_result(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Fallback)
    }
}

/// What the user confirmed for analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub source: Option<PathBuf>,
    pub segment: Segment,
    pub sensitivity: f64,
}

impl AnalysisRequest {
    pub fn new(source: Option<PathBuf>, segment: Segment, sensitivity: f64) -> Self {
        Self {
            source,
            segment,
            sensitivity,
        }
    }

    pub fn validate(&self) -> Result<(), MediaError> {
        if self.source.is_none() {
            return Err(MediaError::NoSource);
        }
        if self.segment.start < 0.0 || !self.segment.is_ordered() {
            return Err(MediaError::InvalidSegment {
                start: self.segment.start,
                end: self.segment.end,
            });
        }
        Ok(())
    }

    fn upload(&self) -> Option<AnalyzeUpload> {
        self.source.as_ref().map(|path| {
            AnalyzeUpload::new(path)
                .with_range(self.segment.start, Some(self.segment.end))
                .with_sensitivity(self.sensitivity)
        })
    }
}

/// Work requested by a transition.
#[derive(Debug)]
pub enum Effect {
    /// Raise a user-visible alert.
    Notify(AlertNotification),
    /// Call the detection service for this request.
    CallService { id: RequestId },
    /// Wait, then synthesize a fallback result for this request.
    ScheduleFallback {
        id: RequestId,
        delay: Duration,
        reason: String,
    },
    /// The request reached a terminal phase.
    Complete { id: RequestId, phase: Phase },
    /// A superseded request resolved; its outcome was dropped.
    Discard { id: RequestId },
    /// Surface an error to the caller.
    Reject(SessionError),
}

/// Authoritative dispatch state.
#[derive(Debug, Clone)]
pub struct OrchestratorState {
    phase: Phase,
    last_id: RequestId,
    current: Option<RequestId>,
    result: Option<AnalysisResult>,
    alert: Option<AlertNotification>,
    fallback_enabled: bool,
    fallback_latency: Duration,
}

impl OrchestratorState {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            phase: Phase::Idle,
            last_id: RequestId::default(),
            current: None,
            result: None,
            alert: None,
            fallback_enabled: config.fallback_enabled,
            fallback_latency: config.fallback_latency,
        }
    }

    /// Reload persisted state. Never resumes an in-flight request.
    pub fn restore(
        &mut self,
        phase: Phase,
        last_id: RequestId,
        result: Option<AnalysisResult>,
        alert: Option<AlertNotification>,
    ) {
        self.phase = match phase {
            Phase::Dispatching => Phase::Idle,
            other => other,
        };
        self.last_id = last_id;
        self.current = None;
        self.result = result;
        self.alert = alert;
    }

    /// Start a dispatch.
    pub fn begin(&mut self, request: &AnalysisRequest) -> Vec<Effect> {
        if self.phase == Phase::Dispatching {
            let in_flight = self.current.unwrap_or(self.last_id);
            return vec![Effect::Reject(SessionError::Busy(in_flight))];
        }

        if let Err(e) = request.validate() {
            let alert = self.raise(AlertNotification::warning(e.to_string()));
            return vec![Effect::Notify(alert), Effect::Reject(SessionError::from(e))];
        }

        let id = self.last_id.next();
        self.last_id = id;
        self.current = Some(id);
        self.phase = Phase::Dispatching;

        let alert = self.raise(AlertNotification::info(format!(
            "Analyzing {:.1}s-{:.1}s",
            request.segment.start, request.segment.end
        )));
        vec![Effect::Notify(alert), Effect::CallService { id }]
    }

    /// Apply the detection service outcome for `id`.
    pub fn on_remote_outcome(
        &mut self,
        id: RequestId,
        outcome: Result<AnalysisResult, DetectorError>,
    ) -> Vec<Effect> {
        if !self.is_current(id) {
            return vec![Effect::Discard { id }];
        }

        match outcome {
            Ok(result) => {
                let message = format!(
                    "Analysis complete: {} detections in {} frames",
                    result.detection_count, result.total_frames
                );
                self.finish(Phase::Succeeded, Some(result));
                let alert = self.raise(AlertNotification::success(message));
                vec![Effect::Notify(alert), Effect::Complete { id, phase: Phase::Succeeded }]
            }
            // Only a failure on the service side is replaced by simulated data.
            Err(e) if self.fallback_enabled && !e.is_local() => vec![Effect::ScheduleFallback {
                id,
                delay: self.fallback_latency,
                reason: e.to_string(),
            }],
            Err(e) => {
                let failure = SessionError::from(&e);
                self.finish(Phase::Failed, None);
                let alert = self.raise(AlertNotification::error(format!("Analysis failed: {}", e)));
                vec![Effect::Notify(alert), Effect::Reject(failure)]
            }
        }
    }

    /// Install a synthesized result for `id` after the service failed.
    pub fn on_fallback_ready(&mut self, id: RequestId, reason: &str, result: AnalysisResult) -> Vec<Effect> {
        if !self.is_current(id) {
            return vec![Effect::Discard { id }];
        }

        self.finish(Phase::Fallback, Some(result));
        let alert = self.raise(AlertNotification::warning(format!(
            "Detection service unavailable ({}); showing simulated results",
            reason
        )));
        vec![Effect::Notify(alert), Effect::Complete { id, phase: Phase::Fallback }]
    }

    /// Supersede the in-flight request so a new dispatch may start.
    pub fn invalidate(&mut self) -> Option<RequestId> {
        let superseded = self.current.take();
        if self.phase == Phase::Dispatching {
            self.phase = Phase::Idle;
        }
        superseded
    }

    /// Clear the in-flight flag for `id` if the dispatch was abandoned.
    pub fn abandon(&mut self, id: RequestId) -> bool {
        if self.is_current(id) {
            self.current = None;
            self.phase = Phase::Idle;
            return true;
        }
        false
    }

    pub fn raise(&mut self, alert: AlertNotification) -> AlertNotification {
        self.alert = Some(alert.clone());
        alert
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_id(&self) -> RequestId {
        self.last_id
    }

    pub fn current(&self) -> Option<RequestId> {
        self.current
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn alert(&self) -> Option<&AlertNotification> {
        self.alert.as_ref()
    }

    fn is_current(&self, id: RequestId) -> bool {
        self.phase == Phase::Dispatching && self.current == Some(id)
    }

    fn finish(&mut self, phase: Phase, result: Option<AnalysisResult>) {
        self.phase = phase;
        self.current = None;
        if let Some(result) = result {
            self.result = Some(result);
        }
    }
}

/// How a dispatch ended for its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Succeeded(RequestId),
    Fallback(RequestId),
    /// A newer request took over before this one resolved.
    Superseded(RequestId),
}

/// Async driver around [`OrchestratorState`].
pub struct AnalysisOrchestrator {
    service: Arc<dyn DetectionService>,
    state: Mutex<OrchestratorState>,
    fallback: Mutex<FallbackGenerator>,
    alerts: broadcast::Sender<AlertNotification>,
}

impl AnalysisOrchestrator {
    pub fn new(config: &SessionConfig, service: Arc<dyn DetectionService>) -> Self {
        let fallback = match config.fallback_seed {
            Some(seed) => FallbackGenerator::with_seed(seed),
            None => FallbackGenerator::from_clock(),
        };
        let (alerts, _) = broadcast::channel(16);

        Self {
            service,
            state: Mutex::new(OrchestratorState::new(config)),
            fallback: Mutex::new(fallback),
            alerts,
        }
    }

    /// Run one request to a terminal phase.
    ///
    /// Rejected immediately with [`SessionError::Busy`] while another request
    /// is dispatching, and with [`SessionError::Validation`] before any
    /// network call when the request is incomplete.
    pub async fn dispatch(&self, request: AnalysisRequest) -> SessionResult<DispatchOutcome> {
        let mut effects = self.state().begin(&request);
        let mut _in_flight: Option<InFlightGuard<'_>> = None;

        loop {
            let mut next = None;

            for effect in effects {
                match effect {
                    Effect::Notify(alert) => self.publish(alert),
                    Effect::Reject(err) => {
                        if !matches!(err, SessionError::Busy(_)) {
                            record_outcome(if err.is_validation() { "rejected" } else { "failed" });
                        }
                        return Err(err);
                    }
                    Effect::Complete { id, phase } => {
                        record_outcome(phase.as_str());
                        info!(request_id = %id, "Analysis finished: {}", phase.as_str());
                        return Ok(match phase {
                            Phase::Fallback => DispatchOutcome::Fallback(id),
                            _ => DispatchOutcome::Succeeded(id),
                        });
                    }
                    Effect::Discard { id } => {
                        debug!(request_id = %id, "Discarding stale response");
                        record_outcome("superseded");
                        return Ok(DispatchOutcome::Superseded(id));
                    }
                    pending @ (Effect::CallService { .. } | Effect::ScheduleFallback { .. }) => {
                        next = Some(pending);
                    }
                }
            }

            effects = match next {
                Some(Effect::CallService { id }) => {
                    _in_flight = Some(InFlightGuard { owner: self, id });
                    info!(request_id = %id, "Dispatching analysis request");

                    let outcome = match request.upload() {
                        Some(upload) => self.service.analyze(&upload).await,
                        None => Err(DetectorError::InvalidResponse("request has no source".to_string())),
                    };
                    if let Err(e) = &outcome {
                        warn!(request_id = %id, "Detection service call failed: {}", e);
                    }

                    let mut state = self.state();
                    state.on_remote_outcome(id, outcome)
                }
                Some(Effect::ScheduleFallback { id, delay, reason }) => {
                    info!(request_id = %id, "Synthesizing fallback result in {:?}", delay);
                    tokio::time::sleep(delay).await;

                    let result = self.fallback().generate(&request.segment, delay);
                    let mut state = self.state();
                    state.on_fallback_ready(id, &reason, result)
                }
                _ => {
                    error!("Dispatch transition produced no terminal effect");
                    return Err(SessionError::Transport("dispatch stalled".to_string()));
                }
            };
        }
    }

    /// Supersede whatever is in flight.
    pub fn invalidate(&self) {
        if let Some(id) = self.state().invalidate() {
            info!(request_id = %id, "Superseded in-flight analysis");
        }
    }

    /// Raise an alert outside of a dispatch.
    pub fn notify(&self, alert: AlertNotification) {
        let alert = self.state().raise(alert);
        self.publish(alert);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertNotification> {
        self.alerts.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.state().phase()
    }

    pub fn result(&self) -> Option<AnalysisResult> {
        self.state().result().cloned()
    }

    pub fn last_alert(&self) -> Option<AlertNotification> {
        self.state().alert().cloned()
    }

    pub fn last_id(&self) -> RequestId {
        self.state().last_id()
    }

    pub fn restore(
        &self,
        phase: Phase,
        last_id: RequestId,
        result: Option<AnalysisResult>,
        alert: Option<AlertNotification>,
    ) {
        self.state().restore(phase, last_id, result, alert);
    }

    fn publish(&self, alert: AlertNotification) {
        match alert.kind {
            AlertKind::Error => error!("{}", alert.message),
            AlertKind::Warning => warn!("{}", alert.message),
            AlertKind::Success | AlertKind::Info => info!("{}", alert.message),
        }
        // No subscribers is fine.
        let _ = self.alerts.send(alert);
    }

    fn state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fallback(&self) -> MutexGuard<'_, FallbackGenerator> {
        self.fallback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag if a dispatch future is dropped mid-request.
struct InFlightGuard<'a> {
    owner: &'a AnalysisOrchestrator,
    id: RequestId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.owner.state().abandon(self.id) {
            warn!(request_id = %self.id, "Analysis abandoned before completion");
        }
    }
}

fn record_outcome(outcome: &'static str) {
    metrics::counter!("batlens_dispatch_total", "outcome" => outcome).increment(1);
}

//! Analysis session orchestration.
//!
//! This crate provides:
//! - The dispatch state machine with stale-response discarding
//! - Fallback result synthesis when the detection service fails
//! - Debounced sensitivity settings
//! - Session snapshots so state survives between CLI invocations

pub mod config;
pub mod error;
pub mod fallback;
pub mod orchestrator;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod timer;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use fallback::FallbackGenerator;
pub use orchestrator::{AnalysisOrchestrator, AnalysisRequest, DispatchOutcome, Effect, OrchestratorState, Phase};
pub use session::AnalysisSession;
pub use settings::SensitivitySettingsStore;
pub use snapshot::{SessionSnapshot, SourceRecord};
pub use timer::ScheduledTask;

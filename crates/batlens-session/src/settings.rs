//! Debounced sensitivity settings.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::timer::ScheduledTask;

pub const MIN_SENSITIVITY: f64 = 0.1;
pub const MAX_SENSITIVITY: f64 = 1.0;
pub const DEFAULT_SENSITIVITY: f64 = 1.0;

/// Clamp a raw input into the sensitivity domain.
pub fn clamp_sensitivity(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
    } else {
        DEFAULT_SENSITIVITY
    }
}

/// A scheduled commit. Whichever of the timer and `flush` claims it first
/// performs the commit.
struct PendingCommit {
    task: ScheduledTask,
    claimed: Arc<AtomicBool>,
}

/// Claim and write under the channel's write lock, so a claimed commit can
/// never land after a later one.
fn commit_once(committed: &watch::Sender<f64>, claimed: &AtomicBool, value: f64) -> bool {
    committed.send_if_modified(|current| {
        if claimed.swap(true, Ordering::SeqCst) {
            return false;
        }
        *current = value;
        true
    })
}

/// Sensitivity with immediate pending feedback and a debounced commit.
///
/// Every input replaces the pending value and reschedules the single commit
/// timer; the committed value changes once the input has been quiet for the
/// configured period. [`SensitivitySettingsStore::input`] must be called
/// from within a tokio runtime.
pub struct SensitivitySettingsStore {
    pending: f64,
    committed: Arc<watch::Sender<f64>>,
    commits: Arc<AtomicU64>,
    quiet_period: Duration,
    timer: Option<PendingCommit>,
}

impl SensitivitySettingsStore {
    pub fn new(initial: f64, quiet_period: Duration) -> Self {
        let initial = clamp_sensitivity(initial);
        let (committed, _) = watch::channel(initial);
        Self {
            pending: initial,
            committed: Arc::new(committed),
            commits: Arc::new(AtomicU64::new(0)),
            quiet_period,
            timer: None,
        }
    }

    /// Record a UI change; returns the clamped pending value.
    pub fn input(&mut self, value: f64) -> f64 {
        let value = clamp_sensitivity(value);
        self.pending = value;

        if let Some(previous) = self.timer.take() {
            self.committed.send_if_modified(|_| {
                previous.claimed.store(true, Ordering::SeqCst);
                false
            });
            previous.task.cancel();
        }

        let claimed = Arc::new(AtomicBool::new(false));
        let committed = Arc::clone(&self.committed);
        let commits = Arc::clone(&self.commits);
        let flag = Arc::clone(&claimed);
        let task = ScheduledTask::after(self.quiet_period, move || {
            if commit_once(&committed, &flag, value) {
                commits.fetch_add(1, Ordering::SeqCst);
                debug!("Committed sensitivity {:.2}", value);
            }
        });
        self.timer = Some(PendingCommit { task, claimed });

        value
    }

    /// Commit the pending value now if a commit is still scheduled.
    pub fn flush(&mut self) -> f64 {
        if let Some(scheduled) = self.timer.take() {
            if commit_once(&self.committed, &scheduled.claimed, self.pending) {
                self.commits.fetch_add(1, Ordering::SeqCst);
                debug!("Flushed sensitivity {:.2}", self.pending);
            }
            scheduled.task.cancel();
        }
        self.committed()
    }

    pub fn pending(&self) -> f64 {
        self.pending
    }

    pub fn committed(&self) -> f64 {
        *self.committed.borrow()
    }

    pub fn is_commit_scheduled(&self) -> bool {
        self.timer
            .as_ref()
            .is_some_and(|t| !t.claimed.load(Ordering::SeqCst))
    }

    /// Observe committed values.
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.committed.subscribe()
    }

    /// Number of commits since creation.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

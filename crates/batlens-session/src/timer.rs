//! Cancellable scheduled work.

use std::time::Duration;

use tokio::task::JoinHandle;

/// A task that runs once after a delay unless cancelled first.
///
/// Dropping the task cancels it. Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn after<F>(delay: Duration, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
        Self { handle }
    }

    pub fn cancel(self) {
        // Drop aborts.
    }

    /// Whether the scheduled work already ran (or was aborted).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

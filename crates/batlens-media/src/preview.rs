//! Preview references for selected media.
//!
//! A [`PreviewHandle`] stands in for the playable reference a viewer keeps
//! to the selected file. Handles are counted by their [`PreviewRegistry`]
//! and released either explicitly or on drop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

/// Issues preview handles and tracks how many are alive.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<AtomicUsize>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a preview reference for a file.
    pub fn acquire(&self, path: impl AsRef<Path>) -> PreviewHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        let handle = PreviewHandle {
            id: Uuid::new_v4(),
            path: path.as_ref().to_path_buf(),
            live: Arc::clone(&self.live),
            released: false,
        };
        debug!("Acquired preview {}", handle.uri());
        handle
    }

    /// Number of handles not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Scoped preview reference; released exactly once.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    path: PathBuf,
    live: Arc<AtomicUsize>,
    released: bool,
}

impl PreviewHandle {
    pub fn uri(&self) -> String {
        format!("preview://{}", self.id)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the reference now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
            debug!("Released preview {}", self.uri());
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

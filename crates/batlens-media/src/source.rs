//! Selected media source and its lifetime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::probe::{FfprobeMetadata, MetadataProbe};

/// The currently selected video.
#[derive(Debug)]
pub struct MediaSource {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    /// Seconds; zero until metadata resolves
    pub duration: f64,
    preview: PreviewHandle,
}

impl MediaSource {
    pub fn preview_uri(&self) -> String {
        self.preview.uri()
    }

    pub fn has_metadata(&self) -> bool {
        self.duration > 0.0
    }
}

/// Owns the selected file and its preview reference.
pub struct MediaSourceManager {
    config: MediaConfig,
    registry: PreviewRegistry,
    probe: Arc<dyn MetadataProbe>,
    current: Option<MediaSource>,
}

impl MediaSourceManager {
    pub fn new(config: MediaConfig) -> Self {
        Self::with_probe(config, Arc::new(FfprobeMetadata))
    }

    pub fn with_probe(config: MediaConfig, probe: Arc<dyn MetadataProbe>) -> Self {
        Self {
            config,
            registry: PreviewRegistry::new(),
            probe,
            current: None,
        }
    }

    /// Replace the current source with a validated file.
    ///
    /// The previous preview is released before the new one is acquired. On a
    /// validation failure the previous source is kept.
    pub fn select(&mut self, path: impl AsRef<Path>) -> MediaResult<&MediaSource> {
        let path = path.as_ref();
        let size_bytes = self.validate_file(path)?;

        if let Some(previous) = self.current.take() {
            previous.preview.release();
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        info!("Selected media source {} ({} bytes)", path.display(), size_bytes);

        let source = MediaSource {
            path: path.to_path_buf(),
            file_name,
            size_bytes,
            duration: 0.0,
            preview: self.registry.acquire(path),
        };
        Ok(self.current.insert(source))
    }

    /// Wait for the media to expose its duration.
    ///
    /// Returns zero when nothing is selected or the file never yields
    /// metadata; the failure is logged, not propagated.
    pub async fn resolve_metadata(&mut self) -> f64 {
        let Some(path) = self.current.as_ref().map(|s| s.path.clone()) else {
            return 0.0;
        };

        let resolved =
            tokio::time::timeout(self.config.metadata_timeout, self.probe.duration(&path)).await;

        let duration = match resolved {
            Ok(Ok(duration)) => duration,
            Ok(Err(e)) => {
                warn!("Could not resolve metadata for {}: {}", path.display(), e);
                0.0
            }
            Err(_) => {
                warn!(
                    "Metadata for {} not available after {:?}",
                    path.display(),
                    self.config.metadata_timeout
                );
                0.0
            }
        };

        // The source may have been replaced while the probe was pending.
        match self.current.as_mut() {
            Some(source) if source.path == path => {
                source.duration = duration;
                duration
            }
            _ => 0.0,
        }
    }

    /// Reattach a source recorded earlier without probing it again.
    pub fn restore(&mut self, path: impl AsRef<Path>, duration: f64) -> MediaResult<&MediaSource> {
        self.select(path)?;
        match self.current.as_mut() {
            Some(source) => {
                source.duration = duration.max(0.0);
                Ok(source)
            }
            None => Err(MediaError::NoSource),
        }
    }

    /// Release the preview and forget the source.
    pub fn teardown(&mut self) {
        if let Some(source) = self.current.take() {
            source.preview.release();
        }
    }

    pub fn current(&self) -> Option<&MediaSource> {
        self.current.as_ref()
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    fn validate_file(&self, path: &Path) -> MediaResult<u64> {
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::FileNotFound(path.to_path_buf()),
            _ => MediaError::Io(e),
        })?;
        if !meta.is_file() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !self.config.is_allowed_extension(&extension) {
            return Err(MediaError::UnsupportedFormat {
                extension,
                allowed: self.config.allowed_extensions.join(", "),
            });
        }

        if meta.len() > self.config.max_file_size {
            return Err(MediaError::FileTooLarge {
                size: meta.len(),
                max: self.config.max_file_size,
            });
        }

        Ok(meta.len())
    }
}

impl Drop for MediaSourceManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedProbe(f64);

    #[async_trait]
    impl MetadataProbe for FixedProbe {
        async fn duration(&self, _path: &Path) -> MediaResult<f64> {
            Ok(self.0)
        }
    }

    struct BrokenProbe;

    #[async_trait]
    impl MetadataProbe for BrokenProbe {
        async fn duration(&self, _path: &Path) -> MediaResult<f64> {
            Err(MediaError::InvalidVideo("no moov atom".to_string()))
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl MetadataProbe for HangingProbe {
        async fn duration(&self, _path: &Path) -> MediaResult<f64> {
            std::future::pending::<()>().await;
            Ok(1.0)
        }
    }

    fn video(dir: &tempfile::TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![0u8; len]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_select_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(&dir, "roost.mp4", 16);
        let mut manager = MediaSourceManager::with_probe(MediaConfig::default(), Arc::new(FixedProbe(60.0)));

        let source = manager.select(&path).unwrap();
        assert_eq!(source.file_name, "roost.mp4");
        assert!(!source.has_metadata());

        assert_eq!(manager.resolve_metadata().await, 60.0);
        assert_eq!(manager.current().unwrap().duration, 60.0);
    }

    #[test]
    fn test_replacement_releases_previous_preview() {
        let dir = tempfile::tempdir().unwrap();
        let a = video(&dir, "a.mp4", 1);
        let b = video(&dir, "b.mov", 1);
        let mut manager = MediaSourceManager::with_probe(MediaConfig::default(), Arc::new(FixedProbe(1.0)));
        let registry = manager.registry().clone();

        manager.select(&a).unwrap();
        manager.select(&b).unwrap();
        assert_eq!(registry.live_handles(), 1);

        manager.teardown();
        assert_eq!(registry.live_handles(), 0);
    }

    #[test]
    fn test_drop_releases_preview() {
        let dir = tempfile::tempdir().unwrap();
        let a = video(&dir, "a.mp4", 1);
        let registry = {
            let mut manager = MediaSourceManager::with_probe(MediaConfig::default(), Arc::new(FixedProbe(1.0)));
            manager.select(&a).unwrap();
            manager.registry().clone()
        };
        assert_eq!(registry.live_handles(), 0);
    }

    #[test]
    fn test_rejected_file_keeps_previous_source() {
        let dir = tempfile::tempdir().unwrap();
        let good = video(&dir, "good.mp4", 1);
        let bad = video(&dir, "notes.txt", 1);
        let mut manager = MediaSourceManager::with_probe(MediaConfig::default(), Arc::new(FixedProbe(1.0)));

        manager.select(&good).unwrap();
        let err = manager.select(&bad).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedFormat { .. }));
        assert!(err.is_validation());
        assert_eq!(manager.current().unwrap().file_name, "good.mp4");
        assert_eq!(manager.registry().live_handles(), 1);
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let big = video(&dir, "big.mkv", 64);
        let config = MediaConfig {
            max_file_size: 32,
            ..Default::default()
        };
        let mut manager = MediaSourceManager::with_probe(config, Arc::new(FixedProbe(1.0)));
        assert!(matches!(
            manager.select(&big),
            Err(MediaError::FileTooLarge { size: 64, max: 32 })
        ));
    }

    #[test]
    fn test_missing_file_rejected() {
        let mut manager = MediaSourceManager::with_probe(MediaConfig::default(), Arc::new(FixedProbe(1.0)));
        assert!(matches!(
            manager.select("/nope/missing.mp4"),
            Err(MediaError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_failure_leaves_zero_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(&dir, "corrupt.avi", 1);
        let mut manager = MediaSourceManager::with_probe(MediaConfig::default(), Arc::new(BrokenProbe));
        manager.select(&path).unwrap();

        assert_eq!(manager.resolve_metadata().await, 0.0);
        assert!(!manager.current().unwrap().has_metadata());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_that_never_arrives_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(&dir, "stuck.mp4", 1);
        let config = MediaConfig {
            metadata_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let mut manager = MediaSourceManager::with_probe(config, Arc::new(HangingProbe));
        manager.select(&path).unwrap();

        assert_eq!(manager.resolve_metadata().await, 0.0);
    }

    #[tokio::test]
    async fn test_resolve_without_source() {
        let mut manager = MediaSourceManager::with_probe(MediaConfig::default(), Arc::new(FixedProbe(5.0)));
        assert_eq!(manager.resolve_metadata().await, 0.0);
    }
}

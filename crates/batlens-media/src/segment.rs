//! Trim segment selection.

use batlens_models::Segment;

use crate::error::{MediaError, MediaResult};

/// Owns the start/end trim bounds for the current media.
///
/// Setters clamp into `[0, duration]`. Ordering (`start < end`) is only
/// checked by [`SegmentSelector::validate`] when a dispatch is attempted.
#[derive(Debug, Clone, Default)]
pub struct SegmentSelector {
    duration: f64,
    segment: Segment,
    enabled: bool,
}

impl SegmentSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the full media length. Zero duration disables the controls.
    pub fn reset(&mut self, duration: f64) {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.duration = duration;
        self.segment = Segment::full(duration);
        self.enabled = duration > 0.0;
    }

    /// Restore a previously chosen window, clamped to the current duration.
    pub fn restore(&mut self, segment: Segment) {
        self.set_start(segment.start);
        self.set_end(segment.end);
    }

    pub fn set_start(&mut self, t: f64) -> Segment {
        if self.enabled && t.is_finite() {
            self.segment.start = self.clamp(t);
        }
        self.segment
    }

    pub fn set_end(&mut self, t: f64) -> Segment {
        if self.enabled && t.is_finite() {
            self.segment.end = self.clamp(t);
        }
        self.segment
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check the window is dispatchable for a selected source.
    pub fn validate(&self, has_source: bool) -> MediaResult<Segment> {
        if !has_source {
            return Err(MediaError::NoSource);
        }
        if !self.segment.is_ordered() {
            return Err(MediaError::InvalidSegment {
                start: self.segment.start,
                end: self.segment.end,
            });
        }
        Ok(self.segment)
    }

    fn clamp(&self, t: f64) -> f64 {
        t.clamp(0.0, self.duration)
    }
}

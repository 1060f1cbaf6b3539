//! Trim segment model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Start/end trim window within the source media, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Full-length segment for a media duration.
    pub fn full(duration: f64) -> Self {
        Self::new(0.0, duration.max(0.0))
    }

    /// Length of the window in seconds (zero when inverted).
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Whether the window is non-empty and ordered.
    pub fn is_ordered(&self) -> bool {
        self.start < self.end
    }
}

//! Synthesized results used when the detection service fails.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use batlens_models::analysis::{format_elapsed, format_timestamp, DEFAULT_FPS};
use batlens_models::{AnalysisResult, FrameMovement, Position, Segment};

/// Frame size the synthesized trajectory stays within.
const FRAME_WIDTH: f64 = 1280.0;
const FRAME_HEIGHT: f64 = 720.0;

/// Probability that a synthesized frame contains a bat.
const DETECTION_PROBABILITY: f64 = 0.3;

/// Generates internally consistent placeholder result documents.
pub struct FallbackGenerator {
    rng: StdRng,
}

impl FallbackGenerator {
    /// Deterministic generator for reproducible output.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generator seeded from the wall clock.
    pub fn from_clock() -> Self {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self::with_seed(nanos as u64)
    }

    /// Build a result covering `segment` at the default frame rate.
    ///
    /// Frames are numbered from the segment start, both series are strictly
    /// increasing by frame, and `positions` never outgrows `total_frames`.
    pub fn generate(&mut self, segment: &Segment, elapsed: Duration) -> AnalysisResult {
        let fps = DEFAULT_FPS;
        let total_frames = ((segment.duration() * fps).round() as u64).max(1);
        let first_frame = (segment.start.max(0.0) * fps).round() as u64;

        let mut x = self.rng.random_range(FRAME_WIDTH * 0.25..FRAME_WIDTH * 0.75);
        let mut y = self.rng.random_range(FRAME_HEIGHT * 0.25..FRAME_HEIGHT * 0.75);

        let mut positions = Vec::new();
        let mut movements = Vec::with_capacity(total_frames as usize);

        for offset in 0..total_frames {
            let frame = first_frame + offset;
            let detected = self.rng.random_bool(DETECTION_PROBABILITY);

            if detected {
                x = (x + self.rng.random_range(-24.0..=24.0)).clamp(0.0, FRAME_WIDTH - 1.0);
                y = (y + self.rng.random_range(-16.0..=16.0)).clamp(0.0, FRAME_HEIGHT - 1.0);
                positions.push(Position {
                    frame,
                    x,
                    y,
                    width: self.rng.random_range(8.0..=40.0),
                    height: self.rng.random_range(6.0..=30.0),
                    timestamp: format_timestamp(frame as f64 / fps),
                });
            }

            movements.push(FrameMovement {
                frame,
                count: u32::from(detected),
            });
        }

        AnalysisResult {
            total_frames,
            bat_detected: !positions.is_empty(),
            detection_count: positions.len() as u64,
            start_point: None,
            end_point: None,
            analysis_time: format_elapsed(elapsed.as_secs_f64()),
            fps,
            video_duration: segment.duration(),
            positions,
            movements_per_frame: movements,
        }
        .with_endpoints_from_positions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_result_is_consistent() {
        let mut generator = FallbackGenerator::with_seed(7);
        let result = generator.generate(&Segment::new(2.0, 12.0), Duration::from_secs(2));

        assert_eq!(result.fps, 30.0);
        assert_eq!(result.total_frames, 300);
        assert_eq!(result.movements_per_frame.len(), 300);
        assert_eq!(result.movements_per_frame[0].frame, 60);
        assert!(result.positions.len() as u64 <= result.total_frames);
        assert_eq!(result.detection_count, result.positions.len() as u64);
        assert_eq!(result.bat_detected, !result.positions.is_empty());
        assert!(result.is_frame_ordered());
        assert_eq!(result.analysis_time, "00:02");
        assert_eq!(result.video_duration, 10.0);
    }

    #[test]
    fn test_same_seed_same_document() {
        let segment = Segment::new(0.0, 5.0);
        let a = FallbackGenerator::with_seed(42).generate(&segment, Duration::ZERO);
        let b = FallbackGenerator::with_seed(42).generate(&segment, Duration::ZERO);
        assert_eq!(a, b);
    }

    #[test]
    fn test_endpoints_match_positions() {
        let result = FallbackGenerator::with_seed(3).generate(&Segment::new(0.0, 20.0), Duration::ZERO);
        let first = result.positions.first().map(|p| p.center());
        let last = result.positions.last().map(|p| p.center());
        assert_eq!(result.start_point, first);
        assert_eq!(result.end_point, last);
        for p in &result.positions {
            assert!((0.0..FRAME_WIDTH).contains(&p.x));
            assert!((0.0..FRAME_HEIGHT).contains(&p.y));
            assert!((8.0..=40.0).contains(&p.width));
        }
    }

    #[test]
    fn test_empty_segment_still_has_one_frame() {
        let result = FallbackGenerator::with_seed(1).generate(&Segment::new(5.0, 5.0), Duration::ZERO);
        assert_eq!(result.total_frames, 1);
        assert!(result.positions.len() <= 1);
    }
}

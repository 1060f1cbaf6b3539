//! Chart series, the mounted chart surface and flight path statistics.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use serde::Serialize;
use tracing::debug;

use batlens_models::AnalysisResult;

pub const DEFAULT_CHART_WIDTH: u32 = 960;
pub const DEFAULT_CHART_HEIGHT: u32 = 540;

const MIN_WIDTH: u32 = 64;
const MIN_HEIGHT: u32 = 96;
const MARGIN: u32 = 8;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([200, 200, 200]);
const X_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
const Y_COLOR: Rgb<u8> = Rgb([255, 127, 14]);
const MOVEMENT_COLOR: Rgb<u8> = Rgb([44, 160, 44]);

/// Plot-ready `(frame, value)` pairs, ordered by frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub position_x: Vec<(u64, f64)>,
    pub position_y: Vec<(u64, f64)>,
    pub movements: Vec<(u64, f64)>,
}

impl ChartSeries {
    pub fn is_empty(&self) -> bool {
        self.position_x.is_empty() && self.movements.is_empty()
    }

    fn frame_range(&self) -> Option<(u64, u64)> {
        let frames = self
            .position_x
            .iter()
            .chain(self.movements.iter())
            .map(|&(frame, _)| frame);

        frames.fold(None, |range, frame| match range {
            None => Some((frame, frame)),
            Some((lo, hi)) => Some((lo.min(frame), hi.max(frame))),
        })
    }
}

/// Project a result onto the three chart series.
pub fn derive_series(result: &AnalysisResult) -> ChartSeries {
    ChartSeries {
        position_x: result.positions.iter().map(|p| (p.frame, p.x)).collect(),
        position_y: result.positions.iter().map(|p| (p.frame, p.y)).collect(),
        movements: result
            .movements_per_frame
            .iter()
            .map(|m| (m.frame, f64::from(m.count)))
            .collect(),
    }
}

/// A rasterized chart that counts as mounted until released.
#[derive(Debug)]
pub struct ChartSurface {
    image: RgbImage,
    live: Arc<AtomicUsize>,
    released: bool,
}

impl ChartSurface {
    fn mount(width: u32, height: u32, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            image: RgbImage::from_pixel(width, height, BACKGROUND),
            live,
            released: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Stack the x, y and movement series in three horizontal bands.
    fn draw(&mut self, series: &ChartSeries) {
        let Some((first, last)) = series.frame_range() else {
            return;
        };
        let band = self.height() / 3;
        let panels = [
            (&series.position_x, X_COLOR),
            (&series.position_y, Y_COLOR),
            (&series.movements, MOVEMENT_COLOR),
        ];

        for (i, (points, color)) in panels.into_iter().enumerate() {
            let top = i64::from(band * i as u32 + MARGIN);
            let bottom = i64::from(band * (i as u32 + 1) - MARGIN);
            self.hline(bottom, AXIS);

            let (lo, hi) = value_range(points);
            let mut previous = None;
            for &(frame, value) in points.iter() {
                let px = self.scale_frame(frame, first, last);
                let py = bottom - ((value - lo) / (hi - lo) * (bottom - top) as f64).round() as i64;
                match previous {
                    Some(from) => self.line(from, (px, py), color),
                    None => self.put(px, py, color),
                }
                previous = Some((px, py));
            }
        }
    }

    fn scale_frame(&self, frame: u64, first: u64, last: u64) -> i64 {
        let span = (last - first).max(1) as f64;
        let usable = f64::from(self.width() - 2 * MARGIN - 1);
        i64::from(MARGIN) + ((frame - first) as f64 / span * usable).round() as i64
    }

    fn hline(&mut self, y: i64, color: Rgb<u8>) {
        for x in i64::from(MARGIN)..i64::from(self.width() - MARGIN) {
            self.put(x, y, color);
        }
    }

    // Bresenham
    fn line(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Rgb<u8>) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            self.put(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && x < i64::from(self.width()) && y < i64::from(self.height()) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }
}

impl Drop for ChartSurface {
    fn drop(&mut self) {
        self.release_inner();
    }
}

fn value_range(points: &[(u64, f64)]) -> (f64, f64) {
    let Some(&(_, first)) = points.first() else {
        return (0.0, 1.0);
    };
    let (lo, hi) = points
        .iter()
        .fold((first, first), |(lo, hi), &(_, v)| (lo.min(v), hi.max(v)));
    if hi > lo {
        (lo, hi)
    } else {
        (lo, lo + 1.0)
    }
}

/// Owns at most one mounted [`ChartSurface`].
#[derive(Debug)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
    surface: Option<ChartSurface>,
    live: Arc<AtomicUsize>,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_CHART_WIDTH, DEFAULT_CHART_HEIGHT)
    }
}

impl ChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(MIN_WIDTH),
            height: height.max(MIN_HEIGHT),
            surface: None,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Rasterize `result`, releasing the previous surface first.
    pub fn render(&mut self, result: &AnalysisResult) -> &ChartSurface {
        self.teardown();

        let series = derive_series(result);
        let mut surface = ChartSurface::mount(self.width, self.height, Arc::clone(&self.live));
        surface.draw(&series);

        debug!(
            "Rendered chart {}x{} ({} positions, {} movement frames)",
            self.width,
            self.height,
            series.position_x.len(),
            series.movements.len()
        );
        self.surface.insert(surface)
    }

    pub fn surface(&self) -> Option<&ChartSurface> {
        self.surface.as_ref()
    }

    pub fn teardown(&mut self) {
        if let Some(surface) = self.surface.take() {
            surface.release();
        }
    }

    /// Surfaces mounted and not yet released.
    pub fn live_surfaces(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Axis-aligned extent of the detected positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Flight path statistics for a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectorySummary {
    pub point_count: usize,
    /// Pixels travelled between consecutive positions
    pub path_length: f64,
    /// Seconds between the first and last detection
    pub duration_seconds: f64,
    /// Pixels per second; zero for a single frame
    pub mean_speed: f64,
    pub mean_detections_per_frame: f64,
    pub bounding_box: Option<BoundingBox>,
}

pub fn summarize(result: &AnalysisResult) -> TrajectorySummary {
    let positions = &result.positions;

    let path_length = positions
        .windows(2)
        .map(|w| {
            let dx = w[1].x - w[0].x;
            let dy = w[1].y - w[0].y;
            dx.hypot(dy)
        })
        .sum::<f64>();

    // Positions out of frame order yield a zero span rather than a negative one.
    let duration_seconds = match (positions.first(), positions.last()) {
        (Some(first), Some(last)) if result.fps > 0.0 => last.frame.saturating_sub(first.frame) as f64 / result.fps,
        _ => 0.0,
    };

    let mean_speed = if duration_seconds > 0.0 {
        path_length / duration_seconds
    } else {
        0.0
    };

    let mean_detections_per_frame = if result.movements_per_frame.is_empty() {
        result.detection_count as f64 / result.total_frames.max(1) as f64
    } else {
        let total: u64 = result.movements_per_frame.iter().map(|m| u64::from(m.count)).sum();
        total as f64 / result.movements_per_frame.len() as f64
    };

    let bounding_box = positions.first().map(|first| {
        positions.iter().fold(
            BoundingBox {
                min_x: first.x,
                max_x: first.x,
                min_y: first.y,
                max_y: first.y,
            },
            |b, p| BoundingBox {
                min_x: b.min_x.min(p.x),
                max_x: b.max_x.max(p.x),
                min_y: b.min_y.min(p.y),
                max_y: b.max_y.max(p.y),
            },
        )
    });

    TrajectorySummary {
        point_count: positions.len(),
        path_length,
        duration_seconds,
        mean_speed,
        mean_detections_per_frame,
        bounding_box,
    }
}

impl fmt::Display for TrajectorySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Points: {}", self.point_count)?;
        writeln!(f, "Duration: {:.2} s", self.duration_seconds)?;
        writeln!(f, "Path Length: {:.1} px", self.path_length)?;
        writeln!(f, "Average Speed: {:.1} px/s", self.mean_speed)?;
        write!(f, "Detections per Frame: {:.3}", self.mean_detections_per_frame)?;
        if let Some(b) = &self.bounding_box {
            write!(
                f,
                "\nX Range: {:.1} to {:.1}\nY Range: {:.1} to {:.1}",
                b.min_x, b.max_x, b.min_y, b.max_y
            )?;
        }
        Ok(())
    }
}

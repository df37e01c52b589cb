//! Per-detection acceptance rules.

use crate::decoder::{Detection, Point};
use std::time::Duration;
use tokio::time::Instant;

/// Mean of the detection points, `None` when there are none.
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Centred square covering `fraction` of the shorter frame edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOfInterest {
    fraction: f64,
}

impl RegionOfInterest {
    /// `fraction` is clamped into (0, 1]; non-finite values cover the whole frame.
    pub fn new(fraction: f64) -> Self {
        let fraction = if fraction.is_finite() && fraction > 0.0 {
            fraction.min(1.0)
        } else {
            1.0
        };
        Self { fraction }
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// `(min, max)` corners of the square for a `width x height` frame.
    pub fn bounds(&self, width: u32, height: u32) -> (Point, Point) {
        let (w, h) = (f64::from(width), f64::from(height));
        let half = self.fraction * w.min(h) / 2.0;
        let (cx, cy) = (w / 2.0, h / 2.0);
        (
            Point::new(cx - half, cy - half),
            Point::new(cx + half, cy + half),
        )
    }

    /// Boundary points are inside.
    pub fn contains(&self, width: u32, height: u32, point: Point) -> bool {
        let (min, max) = self.bounds(width, height);
        (min.x..=max.x).contains(&point.x) && (min.y..=max.y).contains(&point.y)
    }
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self::new(0.65)
    }
}

/// Cooldown between any two accepted decodes, plus a repeat window for the
/// same value.
#[derive(Debug, Clone)]
pub struct DedupWindow {
    cooldown: Duration,
    repeat_cooldown: Duration,
    last: Option<(String, Instant)>,
}

impl DedupWindow {
    pub fn new(cooldown: Duration, repeat_cooldown: Duration) -> Self {
        Self {
            cooldown,
            repeat_cooldown,
            last: None,
        }
    }

    pub fn check(&self, text: &str, now: Instant) -> Result<(), Rejection> {
        let Some((last_text, last_at)) = &self.last else {
            return Ok(());
        };
        let elapsed = now.saturating_duration_since(*last_at);
        if elapsed < self.cooldown {
            return Err(Rejection::Cooldown);
        }
        if last_text == text && elapsed < self.repeat_cooldown {
            return Err(Rejection::Duplicate);
        }
        Ok(())
    }

    pub fn record(&mut self, text: &str, now: Instant) {
        self.last = Some((text.to_string(), now));
    }

    pub fn last_value(&self) -> Option<&str> {
        self.last.as_ref().map(|(text, _)| text.as_str())
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Why a detection was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OutsideRegion,
    Cooldown,
    Duplicate,
}

/// Region filter followed by the dedup window.
#[derive(Debug, Clone)]
pub struct AcceptanceFilter {
    region: RegionOfInterest,
    dedup: DedupWindow,
}

impl AcceptanceFilter {
    pub fn new(region: RegionOfInterest, dedup: DedupWindow) -> Self {
        Self { region, dedup }
    }

    /// Accepting records the detection as the latest decode.
    pub fn evaluate(
        &mut self,
        width: u32,
        height: u32,
        detection: &Detection,
        now: Instant,
    ) -> Result<(), Rejection> {
        // Backends that report no corners skip the region check.
        if let Some(center) = centroid(&detection.points) {
            if !self.region.contains(width, height, center) {
                return Err(Rejection::OutsideRegion);
            }
        }
        self.dedup.check(&detection.text, now)?;
        self.dedup.record(&detection.text, now);
        Ok(())
    }

    pub fn last_value(&self) -> Option<&str> {
        self.dedup.last_value()
    }

    pub fn reset(&mut self) {
        self.dedup.reset();
    }
}

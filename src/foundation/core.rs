pub use kurbo::{Point, Rect, Vec2};

/// Zero-based index of a page within a chapter.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PageIndex(pub u32);

/// Chapter-wide reading-order position of a panel, assigned by the resolver.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Ordinal(pub u32);

impl Ordinal {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable identity cluster id. Doubles as the index into the cluster arena.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Unit page rectangle in normalized page coordinates.
pub const UNIT_PAGE: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);

/// Convert seconds to the nearest sample index at `sample_rate`.
pub fn secs_to_samples(secs: f64, sample_rate: u32) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * f64::from(sample_rate)).round() as u64
}

/// Convert a sample count back to seconds at `sample_rate`.
pub fn samples_to_secs(samples: u64, sample_rate: u32) -> f64 {
    (samples as f64) / f64::from(sample_rate)
}

pub(crate) fn rect_is_finite(r: Rect) -> bool {
    r.x0.is_finite() && r.y0.is_finite() && r.x1.is_finite() && r.y1.is_finite()
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;

use crate::foundation::core::Rect;

/// Orientation of a gutter band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GutterAxis {
    /// Band spans the full region width and separates a top group from a bottom group.
    Horizontal,
    /// Band spans the full region height and separates a right group from a left group.
    Vertical,
}

/// A full-span band of background between two panel groups.
///
/// Derived on demand while resolving reading order; never stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gutter {
    pub axis: GutterAxis,
    /// Band start along the split axis (`y` for horizontal, `x` for vertical).
    pub lo: f64,
    /// Band end along the split axis.
    pub hi: f64,
}

impl Gutter {
    /// Band thickness. Zero for panels that touch without whitespace.
    pub fn width(&self) -> f64 {
        (self.hi - self.lo).max(0.0)
    }

    /// Split coordinate used to cut the enclosing region.
    pub fn center(&self) -> f64 {
        0.5 * (self.lo + self.hi)
    }

    /// Cut `region` at this gutter, returning `(first, second)` in visiting order:
    /// top before bottom, right before left.
    pub fn split(&self, region: Rect) -> (Rect, Rect) {
        let c = self.center();
        match self.axis {
            GutterAxis::Horizontal => (
                Rect::new(region.x0, region.y0, region.x1, c),
                Rect::new(region.x0, c, region.x1, region.y1),
            ),
            GutterAxis::Vertical => (
                Rect::new(c, region.y0, region.x1, region.y1),
                Rect::new(region.x0, region.y0, c, region.y1),
            ),
        }
    }
}

/// Panel boxes of one (possibly merged) page plus spatial queries over them.
///
/// Panels are addressed by their slot in the vector passed to [`GeometryIndex::new`].
#[derive(Clone, Debug, Default)]
pub struct GeometryIndex {
    rects: Vec<Rect>,
}

impl GeometryIndex {
    pub fn new(rects: Vec<Rect>) -> Self {
        Self {
            rects: rects.into_iter().map(|r| r.abs()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rect(&self, slot: usize) -> Rect {
        self.rects[slot]
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Intersection area divided by the smaller panel's area, in `[0, 1]`.
    pub fn overlap_ratio(&self, a: usize, b: usize) -> f64 {
        let ra = self.rects[a];
        let rb = self.rects[b];
        let inter = ra.intersect(rb).area();
        let min_area = ra.area().min(rb.area());
        if min_area <= 0.0 {
            return 0.0;
        }
        (inter / min_area).clamp(0.0, 1.0)
    }

    /// `true` when `inner` is strictly smaller than `outer` and at least `min_overlap` of its
    /// area lies inside `outer`.
    pub fn encloses(&self, outer: usize, inner: usize, min_overlap: f64) -> bool {
        outer != inner
            && self.rects[inner].area() < self.rects[outer].area()
            && self.overlap_ratio(outer, inner) >= min_overlap
    }

    /// Every full-span gutter of `axis` that cleanly separates `slots` into two non-empty groups.
    ///
    /// Panels may intrude up to `intrusion_tolerance` into a band without breaking it. Bands
    /// thinner than `min_gutter` are discarded.
    pub fn gutters(
        &self,
        slots: &[usize],
        axis: GutterAxis,
        min_gutter: f64,
        intrusion_tolerance: f64,
    ) -> Vec<Gutter> {
        if slots.len() < 2 {
            return Vec::new();
        }

        let mut spans: Vec<(f64, f64)> = slots
            .iter()
            .map(|&s| {
                let r = self.rects[s];
                match axis {
                    GutterAxis::Horizontal => (r.y0, r.y1),
                    GutterAxis::Vertical => (r.x0, r.x1),
                }
            })
            .collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut out = Vec::new();
        let mut covered_to = spans[0].1;
        for &(lo, hi) in &spans[1..] {
            // A band opens where the next panel starts after everything seen so far has ended,
            // allowing for small intrusions on either side.
            if lo + intrusion_tolerance >= covered_to - intrusion_tolerance {
                let gutter = Gutter {
                    axis,
                    lo: covered_to.min(lo),
                    hi: lo.max(covered_to),
                };
                let width = if lo >= covered_to { lo - covered_to } else { 0.0 };
                if width >= min_gutter {
                    out.push(gutter);
                }
            }
            covered_to = covered_to.max(hi);
        }
        out
    }

    /// Partition `slots` by which side of `gutter` each panel's center falls on.
    pub fn partition(&self, slots: &[usize], gutter: &Gutter) -> (Vec<usize>, Vec<usize>) {
        let c = gutter.center();
        let mut first = Vec::new();
        let mut second = Vec::new();
        for &s in slots {
            let center = self.rects[s].center();
            let in_first = match gutter.axis {
                GutterAxis::Horizontal => center.y < c,
                GutterAxis::Vertical => center.x > c,
            };
            if in_first {
                first.push(s);
            } else {
                second.push(s);
            }
        }
        (first, second)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/index.rs"]
mod tests;

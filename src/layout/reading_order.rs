use std::cmp::Ordering;

use crate::config::LayoutConfig;
use crate::foundation::core::{Ordinal, PageIndex, Rect, UNIT_PAGE, Vec2, rect_is_finite};
use crate::foundation::error::PanelwaveError;
use crate::geometry::index::{GeometryIndex, Gutter, GutterAxis};
use crate::model::chapter::{ChapterInput, PageInput};

/// Decides whether two consecutive pages form a double-page spread.
///
/// The continuity decision belongs to the vision service; implementations only interpret its
/// signal. Binding-edge contact is checked separately by the resolver.
pub trait SpreadContinuity: Send + Sync {
    fn continues(&self, page: &PageInput, next: &PageInput) -> bool;
}

/// Reads the `spread_with_next` flag reported by the vision service.
#[derive(Clone, Copy, Debug, Default)]
pub struct VisionContinuity;

impl SpreadContinuity for VisionContinuity {
    fn continues(&self, page: &PageInput, _next: &PageInput) -> bool {
        page.spread_with_next.unwrap_or(false)
    }
}

static VISION_CONTINUITY: VisionContinuity = VisionContinuity;

/// One panel in chapter reading order.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedPanel {
    pub ordinal: Ordinal,
    pub page: PageIndex,
    /// Position of the owning page in [`ChapterInput::pages`].
    pub page_slot: usize,
    /// Panel id, or a generated id for a synthetic full-page panel.
    pub id: String,
    /// Page-relative bounds.
    pub bounds: Rect,
    /// Slots in `PageInput::panels` whose detections belong to this panel. A synthetic panel
    /// absorbs every detection of its page.
    pub sources: Vec<usize>,
    pub synthetic: bool,
}

/// Chapter-wide reading order. Ordinals are `0..len` in sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadingOrder {
    pub panels: Vec<OrderedPanel>,
    /// Pages whose geometry was replaced by a synthetic full-page panel.
    pub recovered_pages: Vec<PageIndex>,
    /// Pairs of pages resolved as one spread, first-read page first.
    pub spreads: Vec<(PageIndex, PageIndex)>,
}

impl ReadingOrder {
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn get(&self, ordinal: Ordinal) -> Option<&OrderedPanel> {
        self.panels.get(ordinal.index())
    }

    /// The page `page` is read as: the first-read page of its spread, or itself.
    pub fn reading_page(&self, page: PageIndex) -> PageIndex {
        self.spreads
            .iter()
            .find(|&&(_, second)| second == page)
            .map_or(page, |&(first, _)| first)
    }
}

/// Recursive gutter partition over page regions.
pub struct ReadingOrderResolver<'a> {
    cfg: &'a LayoutConfig,
    continuity: &'a dyn SpreadContinuity,
}

impl<'a> ReadingOrderResolver<'a> {
    pub fn new(cfg: &'a LayoutConfig) -> Self {
        Self {
            cfg,
            continuity: &VISION_CONTINUITY,
        }
    }

    pub fn with_continuity(cfg: &'a LayoutConfig, continuity: &'a dyn SpreadContinuity) -> Self {
        Self { cfg, continuity }
    }

    /// Order one page's panels. Returns slots into `page.panels`.
    ///
    /// Pages with unusable geometry return an empty vector; [`Self::resolve_chapter`] replaces them
    /// with a synthetic panel.
    pub fn resolve_page(&self, page: &PageInput) -> Vec<usize> {
        if !page_geometry_usable(page) {
            return Vec::new();
        }
        let rects: Vec<Rect> = page.panels.iter().map(|p| p.bounds()).collect();
        let ids: Vec<&str> = page.panels.iter().map(|p| p.id.as_str()).collect();
        let four_koma = page
            .four_koma
            .unwrap_or_else(|| detect_four_koma(&rects, UNIT_PAGE, self.cfg));
        self.order_rects(&rects, &ids, UNIT_PAGE, four_koma)
    }

    #[tracing::instrument(skip_all, fields(title = %chapter.title, chapter = chapter.chapter))]
    pub fn resolve_chapter(&self, chapter: &ChapterInput) -> ReadingOrder {
        let mut page_slots: Vec<usize> = (0..chapter.pages.len()).collect();
        page_slots.sort_by_key(|&s| chapter.pages[s].index);

        let mut out = ReadingOrder::default();
        let mut i = 0;
        while i < page_slots.len() {
            let slot = page_slots[i];
            let page = &chapter.pages[slot];

            if let Some(&next_slot) = page_slots.get(i + 1) {
                let next = &chapter.pages[next_slot];
                if self.is_spread(page, next) {
                    self.push_spread(&mut out, chapter, slot, next_slot);
                    i += 2;
                    continue;
                }
            }

            let order = self.resolve_page(page);
            if order.is_empty() {
                push_synthetic(&mut out, page, slot);
            } else {
                for p in order {
                    push_panel(&mut out, page, slot, p);
                }
            }
            i += 1;
        }

        tracing::info!(
            panels = out.panels.len(),
            recovered = out.recovered_pages.len(),
            spreads = out.spreads.len(),
            "resolved reading order"
        );
        out
    }

    fn is_spread(&self, page: &PageInput, next: &PageInput) -> bool {
        if page.four_koma == Some(true) || next.four_koma == Some(true) {
            return false;
        }
        if !page_geometry_usable(page) || !page_geometry_usable(next) {
            return false;
        }
        if !self.continuity.continues(page, next) {
            return false;
        }
        let tol = self.cfg.binding_edge_tolerance;
        // The first-read page sits on the right, so its binding edge is its left side.
        let right_touches = page.panels.iter().any(|p| p.bounds().x0 <= tol);
        let left_touches = next.panels.iter().any(|p| p.bounds().x1 >= 1.0 - tol);
        right_touches && left_touches
    }

    fn push_spread(
        &self,
        out: &mut ReadingOrder,
        chapter: &ChapterInput,
        right_slot: usize,
        left_slot: usize,
    ) {
        let right = &chapter.pages[right_slot];
        let left = &chapter.pages[left_slot];

        let shift = Vec2::new(1.0, 0.0);
        let mut rects = Vec::with_capacity(right.panels.len() + left.panels.len());
        let mut ids = Vec::with_capacity(rects.capacity());
        let mut owners = Vec::with_capacity(rects.capacity());
        for (k, p) in right.panels.iter().enumerate() {
            rects.push(p.bounds() + shift);
            ids.push(p.id.as_str());
            owners.push((right_slot, k));
        }
        for (k, p) in left.panels.iter().enumerate() {
            rects.push(p.bounds());
            ids.push(p.id.as_str());
            owners.push((left_slot, k));
        }

        let region = Rect::new(0.0, 0.0, 2.0, 1.0);
        let order = self.order_rects(&rects, &ids, region, false);
        tracing::debug!(
            right = right.index.0,
            left = left.index.0,
            panels = order.len(),
            "merged double-page spread"
        );
        for merged in order {
            let (page_slot, panel_slot) = owners[merged];
            push_panel(out, &chapter.pages[page_slot], page_slot, panel_slot);
        }
        out.spreads.push((right.index, left.index));
    }

    fn order_rects(&self, rects: &[Rect], ids: &[&str], region: Rect, four_koma: bool) -> Vec<usize> {
        let slots: Vec<usize> = (0..rects.len()).collect();
        if four_koma {
            return top_to_bottom(rects, ids, slots);
        }
        let idx = GeometryIndex::new(rects.to_vec());
        let mut out = Vec::with_capacity(rects.len());
        self.partition(&idx, ids, slots, region, 0, &mut out);
        out
    }

    fn partition(
        &self,
        idx: &GeometryIndex,
        ids: &[&str],
        slots: Vec<usize>,
        region: Rect,
        depth: u32,
        out: &mut Vec<usize>,
    ) {
        if slots.len() <= 1 {
            out.extend(slots);
            return;
        }
        if depth >= self.cfg.max_depth {
            tracing::debug!(depth, "partition depth limit reached, using corner order");
            out.extend(corner_order(idx, ids, slots, self.cfg));
            return;
        }

        let Some(gutter) = self.choose_gutter(idx, &slots, region) else {
            out.extend(corner_order(idx, ids, slots, self.cfg));
            return;
        };

        let (first, second) = idx.partition(&slots, &gutter);
        if first.is_empty() || second.is_empty() {
            out.extend(corner_order(idx, ids, slots, self.cfg));
            return;
        }
        tracing::debug!(
            axis = ?gutter.axis,
            at = gutter.center(),
            width = gutter.width(),
            first = first.len(),
            second = second.len(),
            "split at gutter"
        );
        let (r_first, r_second) = gutter.split(region);
        self.partition(idx, ids, first, r_first, depth + 1, out);
        self.partition(idx, ids, second, r_second, depth + 1, out);
    }

    fn choose_gutter(&self, idx: &GeometryIndex, slots: &[usize], region: Rect) -> Option<Gutter> {
        let cfg = self.cfg;
        let mut candidates = idx.gutters(
            slots,
            GutterAxis::Horizontal,
            cfg.min_gutter,
            cfg.intrusion_tolerance,
        );
        if candidates.is_empty() {
            candidates = idx.gutters(
                slots,
                GutterAxis::Vertical,
                cfg.min_gutter,
                cfg.intrusion_tolerance,
            );
        }
        let widest = candidates
            .iter()
            .map(Gutter::width)
            .fold(f64::NEG_INFINITY, f64::max);

        // Equally wide candidates resolve to the most balanced split, then the earliest band.
        candidates
            .into_iter()
            .filter(|g| widest - g.width() <= cfg.width_tie_epsilon)
            .map(|g| (balance(&g, region), g))
            .min_by(|(ba, ga), (bb, gb)| bb.total_cmp(ba).then(ga.lo.total_cmp(&gb.lo)))
            .map(|(_, g)| g)
    }
}

fn balance(g: &Gutter, region: Rect) -> f64 {
    let (a, b) = g.split(region);
    let (a, b) = (a.area().abs(), b.area().abs());
    let max = a.max(b);
    if max <= 0.0 { 0.0 } else { a.min(b) / max }
}

fn page_geometry_usable(page: &PageInput) -> bool {
    !page.panels.is_empty()
        && page.panels.iter().all(|p| {
            let r = p.bounds();
            rect_is_finite(r) && r.area() > 0.0
        })
}

fn push_panel(out: &mut ReadingOrder, page: &PageInput, page_slot: usize, panel_slot: usize) {
    let panel = &page.panels[panel_slot];
    out.panels.push(OrderedPanel {
        ordinal: Ordinal(out.panels.len() as u32),
        page: page.index,
        page_slot,
        id: panel.id.clone(),
        bounds: panel.bounds(),
        sources: vec![panel_slot],
        synthetic: false,
    });
}

fn push_synthetic(out: &mut ReadingOrder, page: &PageInput, page_slot: usize) {
    let err = if page.panels.is_empty() {
        PanelwaveError::geometry(format!("page {} has no detected panels", page.index.0))
    } else {
        PanelwaveError::geometry(format!(
            "page {} has degenerate panel geometry",
            page.index.0
        ))
    };
    tracing::warn!(page = page.index.0, error = %err, "substituting full-page panel");
    out.panels.push(OrderedPanel {
        ordinal: Ordinal(out.panels.len() as u32),
        page: page.index,
        page_slot,
        id: format!("page-{}-full", page.index.0),
        bounds: UNIT_PAGE,
        sources: (0..page.panels.len()).collect(),
        synthetic: true,
    });
    out.recovered_pages.push(page.index);
}

/// `true` when the panels look like a 4-koma strip: exactly four wide panels stacked at an even
/// vertical pitch.
pub fn detect_four_koma(rects: &[Rect], page: Rect, cfg: &LayoutConfig) -> bool {
    if rects.len() != 4 {
        return false;
    }
    let mean_width = rects.iter().map(|r| r.width()).sum::<f64>() / 4.0;
    if mean_width < cfg.four_koma_width_ratio * page.width() {
        return false;
    }
    let mut ys: Vec<f64> = rects.iter().map(|r| r.center().y).collect();
    ys.sort_by(f64::total_cmp);
    let gaps: Vec<f64> = ys.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean_gap <= 0.0 {
        return false;
    }
    gaps.iter().all(|g| (g - mean_gap).abs() <= 0.3 * mean_gap)
}

fn top_to_bottom(rects: &[Rect], ids: &[&str], mut slots: Vec<usize>) -> Vec<usize> {
    slots.sort_by(|&a, &b| {
        let (ca, cb) = (rects[a].center(), rects[b].center());
        ca.y.total_cmp(&cb.y)
            .then(cb.x.total_cmp(&ca.x))
            .then_with(|| ids[a].cmp(ids[b]))
    });
    slots
}

/// Fallback order for regions without a clean gutter: top-right corner right-to-left, then
/// top-to-bottom, then smaller enclosing area first.
///
/// Corner coordinates are snapped to `corner_quantum` so that near-aligned panels compare equal
/// on the primary keys. A panel embedded in a larger one (see [`LayoutConfig::nest_overlap`])
/// is always read before its encloser, wherever its corner falls.
pub(crate) fn corner_order(
    idx: &GeometryIndex,
    ids: &[&str],
    mut slots: Vec<usize>,
    cfg: &LayoutConfig,
) -> Vec<usize> {
    let rects = idx.rects();
    slots.sort_by(|&a, &b| {
        corner_cmp(rects[a], rects[b], cfg.corner_quantum).then_with(|| ids[a].cmp(ids[b]))
    });

    let mut seen = vec![false; idx.len()];
    let mut out = Vec::with_capacity(slots.len());
    for &s in &slots {
        emit_enclosed_first(idx, &slots, s, cfg.nest_overlap, &mut seen, &mut out);
    }
    out
}

fn emit_enclosed_first(
    idx: &GeometryIndex,
    sorted: &[usize],
    slot: usize,
    nest_overlap: f64,
    seen: &mut [bool],
    out: &mut Vec<usize>,
) {
    if seen[slot] {
        return;
    }
    seen[slot] = true;
    for &inner in sorted {
        if !seen[inner] && idx.encloses(slot, inner, nest_overlap) {
            emit_enclosed_first(idx, sorted, inner, nest_overlap, seen, out);
        }
    }
    out.push(slot);
}

pub(crate) fn corner_cmp(a: Rect, b: Rect, quantum: f64) -> Ordering {
    let q = |v: f64| (v / quantum).round() as i64;
    q(b.x1)
        .cmp(&q(a.x1))
        .then(q(a.y0).cmp(&q(b.y0)))
        .then(a.area().total_cmp(&b.area()))
        .then(b.x1.total_cmp(&a.x1))
        .then(a.y0.total_cmp(&b.y0))
}

#[cfg(test)]
#[path = "../../tests/unit/layout/reading_order.rs"]
mod tests;

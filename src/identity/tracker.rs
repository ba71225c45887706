use std::collections::BTreeMap;

use crate::config::IdentityConfig;
use crate::foundation::core::{ClusterId, Ordinal};
use crate::foundation::error::{PanelwaveError, PanelwaveResult};
use crate::identity::store::IdentityStore;
use crate::layout::reading_order::ReadingOrder;
use crate::model::chapter::ChapterInput;

/// Cosine similarity accumulated in `f64`. `None` when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na <= f64::EPSILON || nb <= f64::EPSILON {
        return None;
    }
    Some((dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0))
}

/// Counters describing one tracking run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct TrackerStats {
    pub detections: u32,
    pub created: u32,
    pub joined: u32,
    pub merge_passes: u32,
    pub merges: u32,
    /// Assignments decided by a similarity within the ambiguity margin of the threshold.
    pub ambiguous: u32,
}

/// Cluster id per character detection id, remapped through every merge.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdentityAssignments {
    by_detection: BTreeMap<String, ClusterId>,
}

impl IdentityAssignments {
    pub fn get(&self, detection_id: &str) -> Option<ClusterId> {
        self.by_detection.get(detection_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_detection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_detection.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ClusterId)> {
        self.by_detection.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Online nearest-centroid identity tracker.
///
/// Detections must be fed in reading order. The tracker is the single writer of the store for
/// the duration of a chapter.
pub struct IdentityTracker<'s> {
    cfg: &'s IdentityConfig,
    store: &'s mut IdentityStore,
    pending: Vec<(String, ClusterId)>,
    panels_since_merge: u32,
    stats: TrackerStats,
}

impl<'s> IdentityTracker<'s> {
    pub fn new(cfg: &'s IdentityConfig, store: &'s mut IdentityStore) -> Self {
        Self {
            cfg,
            store,
            pending: Vec::new(),
            panels_since_merge: 0,
            stats: TrackerStats::default(),
        }
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Assign one embedding to a cluster, creating a new cluster when nothing is close enough.
    pub fn assign(&mut self, ordinal: Ordinal, embedding: &[f32]) -> PanelwaveResult<ClusterId> {
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(PanelwaveError::validation(
                "character embedding contains non-finite values",
            ));
        }
        self.store.check_dim(embedding.len())?;
        self.stats.detections += 1;

        let mut best: Option<(ClusterId, f64)> = None;
        for c in self.store.active() {
            let Some(sim) = cosine_similarity(&c.centroid, embedding) else {
                continue;
            };
            // Strict comparison keeps the lowest id on exact ties.
            if best.is_none_or(|(_, b)| sim > b) {
                best = Some((c.id, sim));
            }
        }

        let threshold = self.cfg.assign_threshold;
        if let Some((id, sim)) = best
            && (sim - threshold).abs() <= self.cfg.ambiguity_margin
        {
            self.stats.ambiguous += 1;
            tracing::debug!(
                cluster = %id,
                similarity = sim,
                threshold,
                joined = sim >= threshold,
                "ambiguous identity assignment"
            );
        }

        match best {
            Some((id, sim)) if sim >= threshold => {
                self.store
                    .absorb(id, embedding, ordinal, self.cfg.recency_decay);
                self.stats.joined += 1;
                tracing::debug!(cluster = %id, similarity = sim, "joined cluster");
                Ok(id)
            }
            _ => {
                let id = self.store.create(embedding, ordinal);
                self.stats.created += 1;
                tracing::debug!(cluster = %id, "created cluster");
                Ok(id)
            }
        }
    }

    /// Assign every detection of one panel, then run a merge pass when the cadence is due.
    pub fn observe_panel<'d>(
        &mut self,
        ordinal: Ordinal,
        detections: impl IntoIterator<Item = (&'d str, &'d [f32])>,
    ) -> PanelwaveResult<Vec<ClusterId>> {
        let mut ids = Vec::new();
        for (key, embedding) in detections {
            let id = self.assign(ordinal, embedding)?;
            self.pending.push((key.to_string(), id));
            ids.push(id);
        }
        self.panels_since_merge += 1;
        if self.cfg.merge_every_panels > 0 && self.panels_since_merge >= self.cfg.merge_every_panels
        {
            self.merge_pass();
        }
        Ok(ids)
    }

    /// Unify every pair of active clusters whose centroids reach the merge threshold.
    ///
    /// The older (lower) id survives. Repeats until no pair qualifies. Returns the number of
    /// clusters dissolved.
    pub fn merge_pass(&mut self) -> usize {
        self.panels_since_merge = 0;
        self.stats.merge_passes += 1;
        let mut merged = 0;
        while let Some((keep, drop, sim)) = self.find_merge_pair() {
            tracing::debug!(keep = %keep, dissolved = %drop, similarity = sim, "merging clusters");
            self.store.merge(keep, drop);
            merged += 1;
        }
        self.stats.merges += merged as u32;
        merged
    }

    fn find_merge_pair(&self) -> Option<(ClusterId, ClusterId, f64)> {
        let active: Vec<_> = self.store.active().collect();
        for (i, a) in active.iter().enumerate() {
            for b in &active[i + 1..] {
                if let Some(sim) = cosine_similarity(&a.centroid, &b.centroid)
                    && sim >= self.cfg.merge_threshold
                {
                    return Some((a.id, b.id, sim));
                }
            }
        }
        None
    }

    /// Run the closing merge pass and return every detection's surviving cluster id.
    pub fn finish(mut self) -> (IdentityAssignments, TrackerStats) {
        self.merge_pass();
        let mut by_detection = BTreeMap::new();
        for (key, id) in self.pending.drain(..) {
            by_detection.insert(key, self.store.resolve(id));
        }
        (IdentityAssignments { by_detection }, self.stats)
    }
}

/// Cluster every character detection of a chapter in reading order.
#[tracing::instrument(skip_all, fields(title = %chapter.title, chapter = chapter.chapter))]
pub fn track_chapter(
    cfg: &IdentityConfig,
    store: &mut IdentityStore,
    chapter: &ChapterInput,
    order: &ReadingOrder,
) -> PanelwaveResult<(IdentityAssignments, TrackerStats)> {
    let seeded = store.active_count();
    let mut tracker = IdentityTracker::new(cfg, store);
    for panel in &order.panels {
        let page = &chapter.pages[panel.page_slot];
        let detections = panel
            .sources
            .iter()
            .flat_map(|&s| &page.panels[s].characters)
            .map(|c| (c.id.as_str(), c.embedding.as_slice()));
        tracker.observe_panel(panel.ordinal, detections)?;
    }
    let (assignments, stats) = tracker.finish();
    tracing::info!(
        seeded,
        detections = stats.detections,
        created = stats.created,
        merges = stats.merges,
        ambiguous = stats.ambiguous,
        active = store.active_count(),
        "tracked identities"
    );
    Ok((assignments, stats))
}

#[cfg(test)]
#[path = "../../tests/unit/identity/tracker.rs"]
mod tests;

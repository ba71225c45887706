use std::collections::BTreeMap;

use crate::config::{LayoutConfig, SpeakerConfig};
use crate::foundation::core::{ClusterId, Ordinal};
use crate::geometry::index::GeometryIndex;
use crate::identity::tracker::IdentityAssignments;
use crate::layout::reading_order::{OrderedPanel, ReadingOrder, corner_order};
use crate::model::chapter::{BubbleInput, ChapterInput};
use crate::model::scene::PanelScene;
use crate::speaker::assign::{
    AttributionMethod, BubbleCue, Candidate, PreviousBubble, attribute,
};

/// Location of a bubble in the chapter input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BubbleRef {
    pub page_slot: usize,
    pub panel_slot: usize,
    pub bubble_slot: usize,
}

/// Final attribution of one bubble.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct BubbleAttribution {
    pub bubble_id: String,
    pub panel: Ordinal,
    /// Reading-order rank of the bubble within its panel.
    pub rank: u32,
    pub identity: Option<ClusterId>,
    pub confidence: f64,
    pub method: AttributionMethod,
    #[serde(skip)]
    pub source: BubbleRef,
}

/// Every bubble of a chapter in reading order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChapterAttributions {
    pub bubbles: Vec<BubbleAttribution>,
}

impl ChapterAttributions {
    pub fn count(&self, method: AttributionMethod) -> usize {
        self.bubbles.iter().filter(|b| b.method == method).count()
    }

    /// Bubbles of one panel, in rank order.
    pub fn for_panel(&self, panel: Ordinal) -> impl Iterator<Item = &BubbleAttribution> {
        self.bubbles.iter().filter(move |b| b.panel == panel)
    }
}

/// Bubbles of an ordered panel, ranked right-to-left then top-to-bottom.
pub fn ranked_bubbles<'c>(
    chapter: &'c ChapterInput,
    panel: &OrderedPanel,
    layout: &LayoutConfig,
) -> Vec<(BubbleRef, &'c BubbleInput)> {
    let page = &chapter.pages[panel.page_slot];
    let bubbles: Vec<(BubbleRef, &BubbleInput)> = panel
        .sources
        .iter()
        .flat_map(|&panel_slot| {
            page.panels[panel_slot]
                .bubbles
                .iter()
                .enumerate()
                .map(move |(bubble_slot, b)| {
                    (
                        BubbleRef {
                            page_slot: panel.page_slot,
                            panel_slot,
                            bubble_slot,
                        },
                        b,
                    )
                })
        })
        .collect();
    let idx = GeometryIndex::new(bubbles.iter().map(|(_, b)| b.bbox).collect());
    let ids: Vec<&str> = bubbles.iter().map(|(_, b)| b.id.as_str()).collect();
    corner_order(&idx, &ids, (0..bubbles.len()).collect(), layout)
        .into_iter()
        .map(|i| bubbles[i])
        .collect()
}

/// Attribute every bubble in reading order.
#[tracing::instrument(skip_all, fields(title = %chapter.title, chapter = chapter.chapter))]
pub fn attribute_chapter(
    layout: &LayoutConfig,
    cfg: &SpeakerConfig,
    chapter: &ChapterInput,
    order: &ReadingOrder,
    scenes: &[PanelScene],
    identities: &IdentityAssignments,
) -> ChapterAttributions {
    let mut out = ChapterAttributions::default();
    let mut previous: Option<PreviousBubble> = None;

    for (panel, scene) in order.panels.iter().zip(scenes) {
        let page = &chapter.pages[panel.page_slot];
        // Both halves of a spread count as one page for carry-over.
        let reading_page = order.reading_page(panel.page);
        let candidates: Vec<Candidate> = panel
            .sources
            .iter()
            .flat_map(|&s| &page.panels[s].characters)
            .filter_map(|c| {
                identities.get(&c.id).map(|identity| Candidate {
                    identity,
                    center: c.bbox.abs().center(),
                })
            })
            .collect();

        for (rank, (source, bubble)) in ranked_bubbles(chapter, panel, layout)
            .into_iter()
            .enumerate()
        {
            let cue = BubbleCue {
                center: bubble.bbox.abs().center(),
                tail: bubble.tail,
                page: reading_page,
                scene_epoch: scene.epoch,
            };
            let attribution = attribute(cfg, &cue, &candidates, previous.as_ref());
            let confidence = attribution.confidence(cfg);
            tracing::debug!(
                bubble = %bubble.id,
                method = ?attribution.method(),
                identity = ?attribution.identity(),
                confidence,
                "attributed bubble"
            );

            previous = Some(PreviousBubble {
                page: reading_page,
                scene_epoch: scene.epoch,
                identity: attribution.identity(),
                confidence,
            });
            out.bubbles.push(BubbleAttribution {
                bubble_id: bubble.id.clone(),
                panel: panel.ordinal,
                rank: rank as u32,
                identity: attribution.identity(),
                confidence,
                method: attribution.method(),
                source,
            });
        }
    }

    let mut by_method = BTreeMap::new();
    for b in &out.bubbles {
        *by_method.entry(format!("{:?}", b.method)).or_insert(0usize) += 1;
    }
    tracing::info!(bubbles = out.bubbles.len(), methods = ?by_method, "attributed speakers");
    out
}

#[cfg(test)]
#[path = "../../tests/unit/speaker/chapter.rs"]
mod tests;

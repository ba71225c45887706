use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::audio::mix::{MixEngine, MixOutput};
use crate::config::PipelineConfig;
use crate::foundation::error::PanelwaveResult;
use crate::identity::registry::{IdentityRegistry, lock_store};
use crate::identity::store::IdentityStore;
use crate::identity::tracker::{IdentityAssignments, TrackerStats, track_chapter};
use crate::layout::reading_order::{ReadingOrder, ReadingOrderResolver};
use crate::model::chapter::ChapterInput;
use crate::model::scene::{PanelScene, resolve_scenes};
use crate::speaker::assign::AttributionMethod;
use crate::speaker::chapter::{ChapterAttributions, attribute_chapter};
use crate::synth::Synthesizer;
use crate::synth::dispatch::{DispatchStats, build_thread_pool, dispatch};
use crate::timeline::builder::TimelineBuilder;
use crate::timeline::model::Timeline;
use crate::voice::VoiceRegistry;

/// Everything decided for a chapter before any audio exists.
#[derive(Clone, Debug)]
pub struct ChapterPlan {
    pub order: ReadingOrder,
    pub scenes: Vec<PanelScene>,
    pub identities: IdentityAssignments,
    pub identity_stats: TrackerStats,
    pub attributions: ChapterAttributions,
    pub timeline: Timeline,
}

impl ChapterPlan {
    /// Bubbles per attribution method, in cascade order.
    pub fn attribution_summary(&self) -> [(AttributionMethod, usize); 4] {
        [
            AttributionMethod::TailMatched,
            AttributionMethod::Geometric,
            AttributionMethod::CarriedOver,
            AttributionMethod::Unattributed,
        ]
        .map(|m| (m, self.attributions.count(m)))
    }
}

/// Result of a complete chapter run.
#[derive(Clone, Debug)]
pub struct ChapterOutput {
    pub plan: ChapterPlan,
    pub mix: MixOutput,
    pub dispatch: DispatchStats,
}

/// Resolve order, identities, speakers and the timeline for one chapter.
///
/// `store` is mutated by the identity step only and may carry clusters from earlier chapters.
pub fn plan_chapter(
    cfg: &PipelineConfig,
    store: &mut IdentityStore,
    chapter: &ChapterInput,
) -> PanelwaveResult<ChapterPlan> {
    plan_with(cfg, chapter, |order| {
        track_chapter(&cfg.identity, store, chapter, order)
    })
}

/// [`plan_chapter`] against the title's store in `registry`.
///
/// The store lock is held for the identity step only.
pub fn plan_chapter_in(
    cfg: &PipelineConfig,
    registry: &IdentityRegistry,
    chapter: &ChapterInput,
) -> PanelwaveResult<ChapterPlan> {
    let store = registry.store(&chapter.title);
    plan_with(cfg, chapter, |order| {
        let mut guard = lock_store(&store);
        track_chapter(&cfg.identity, &mut guard, chapter, order)
    })
}

#[tracing::instrument(skip_all, fields(title = %chapter.title, chapter = chapter.chapter))]
fn plan_with(
    cfg: &PipelineConfig,
    chapter: &ChapterInput,
    track: impl FnOnce(&ReadingOrder) -> PanelwaveResult<(IdentityAssignments, TrackerStats)>,
) -> PanelwaveResult<ChapterPlan> {
    cfg.validate()?;
    chapter.validate()?;

    let order = ReadingOrderResolver::new(&cfg.layout).resolve_chapter(chapter);
    let (identities, identity_stats) = track(&order)?;
    let scenes = resolve_scenes(chapter, &order, &cfg.timeline.fallback_scene);
    let attributions = attribute_chapter(
        &cfg.layout,
        &cfg.speaker,
        chapter,
        &order,
        &scenes,
        &identities,
    );
    let voices = VoiceRegistry::new(chapter.title.clone());
    let timeline = TimelineBuilder::new(&cfg.timeline, &voices).build(
        chapter,
        &order,
        &scenes,
        &attributions,
    )?;

    Ok(ChapterPlan {
        order,
        scenes,
        identities,
        identity_stats,
        attributions,
        timeline,
    })
}

/// Plan, synthesize and mix one chapter.
///
/// Per-event synthesis failures never fail the run; they show up in `mix.degraded`.
pub fn run_chapter(
    cfg: &PipelineConfig,
    store: &mut IdentityStore,
    chapter: &ChapterInput,
    synth: Arc<dyn Synthesizer>,
) -> PanelwaveResult<ChapterOutput> {
    let plan = plan_chapter(cfg, store, chapter)?;
    render_plan(cfg, plan, synth)
}

/// [`run_chapter`] against the title's store in `registry`.
pub fn run_chapter_in(
    cfg: &PipelineConfig,
    registry: &IdentityRegistry,
    chapter: &ChapterInput,
    synth: Arc<dyn Synthesizer>,
) -> PanelwaveResult<ChapterOutput> {
    let plan = plan_chapter_in(cfg, registry, chapter)?;
    render_plan(cfg, plan, synth)
}

/// Synthesize and mix an already planned chapter.
pub fn render_plan(
    cfg: &PipelineConfig,
    plan: ChapterPlan,
    synth: Arc<dyn Synthesizer>,
) -> PanelwaveResult<ChapterOutput> {
    let settled = dispatch(&plan.timeline, &cfg.timeline, &cfg.synthesis, synth)?;
    let mix = MixEngine::new(&cfg.mix).mix(&plan.timeline, &settled.fragments)?;
    Ok(ChapterOutput {
        plan,
        mix,
        dispatch: settled.stats,
    })
}

/// Run many chapters. Titles run in parallel; chapters of one title run in input order.
///
/// Results are returned in input order. A failed chapter does not stop the others.
pub fn run_chapters(
    cfg: &PipelineConfig,
    registry: &IdentityRegistry,
    chapters: &[ChapterInput],
    synth: Arc<dyn Synthesizer>,
    threads: Option<usize>,
) -> PanelwaveResult<Vec<PanelwaveResult<ChapterOutput>>> {
    let mut by_title: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, c) in chapters.iter().enumerate() {
        by_title.entry(c.title.as_str()).or_default().push(i);
    }
    let groups: Vec<Vec<usize>> = by_title.into_values().collect();

    let pool = build_thread_pool(threads)?;
    let done: Vec<Vec<(usize, PanelwaveResult<ChapterOutput>)>> = pool.install(|| {
        groups
            .par_iter()
            .map(|group| {
                group
                    .iter()
                    .map(|&i| {
                        let out = run_chapter_in(cfg, registry, &chapters[i], Arc::clone(&synth));
                        if let Err(e) = &out {
                            tracing::error!(
                                title = %chapters[i].title,
                                chapter = chapters[i].chapter,
                                "chapter aborted: {e}"
                            );
                        }
                        (i, out)
                    })
                    .collect()
            })
            .collect()
    });

    let mut slots: Vec<(usize, PanelwaveResult<ChapterOutput>)> =
        done.into_iter().flatten().collect();
    slots.sort_by_key(|(i, _)| *i);
    Ok(slots.into_iter().map(|(_, out)| out).collect())
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/chapter.rs"]
mod tests;

use crate::config::{LanguageMode, TimelineConfig};
use crate::foundation::error::{PanelwaveError, PanelwaveResult};
use crate::layout::reading_order::ReadingOrder;
use crate::model::chapter::ChapterInput;
use crate::model::scene::PanelScene;
use crate::speaker::chapter::ChapterAttributions;
use crate::timeline::model::{EventKind, EventSource, PanelSlot, Timeline, TimelineEvent};
use crate::voice::{VoiceRegistry, prosody_for};

/// `true` for languages whose lettering is measured in characters rather than words.
pub fn is_cjk_language(language: &str) -> bool {
    let primary = language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    matches!(primary.as_str(), "ja" | "zh" | "ko")
}

/// Length of `text` in dwell units: non-whitespace characters or whitespace-separated words.
pub fn text_length(text: &str, mode: LanguageMode, language: &str) -> usize {
    let by_chars = match mode {
        LanguageMode::Characters => true,
        LanguageMode::Words => false,
        LanguageMode::Auto => is_cjk_language(language),
    };
    if by_chars {
        text.chars().filter(|c| !c.is_whitespace()).count()
    } else {
        text.split_whitespace().count()
    }
}

/// Clamped dwell time for a panel.
pub fn dwell_secs(cfg: &TimelineConfig, text_units: usize, object_count: usize) -> f64 {
    let raw = cfg.secs_per_text_unit * text_units as f64 + cfg.secs_per_object * object_count as f64;
    raw.clamp(cfg.min_dwell_secs, cfg.max_dwell_secs)
}

/// Builds the chapter timeline from resolved order, tags and attributions.
pub struct TimelineBuilder<'a> {
    cfg: &'a TimelineConfig,
    voices: &'a VoiceRegistry,
}

struct Pending {
    event: TimelineEvent,
    seq: usize,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(cfg: &'a TimelineConfig, voices: &'a VoiceRegistry) -> Self {
        Self { cfg, voices }
    }

    #[tracing::instrument(skip_all, fields(title = %chapter.title, chapter = chapter.chapter))]
    pub fn build(
        &self,
        chapter: &ChapterInput,
        order: &ReadingOrder,
        scenes: &[PanelScene],
        attributions: &ChapterAttributions,
    ) -> PanelwaveResult<Timeline> {
        if scenes.len() != order.len() {
            return Err(PanelwaveError::timeline_invariant(format!(
                "{} scene entries for {} ordered panels",
                scenes.len(),
                order.len()
            )));
        }
        let cfg = self.cfg;

        let mut slots = Vec::with_capacity(order.len());
        let mut cursor = 0.0f64;
        for (i, panel) in order.panels.iter().enumerate() {
            if panel.ordinal.index() != i {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "reading order position {i} holds ordinal {}",
                    panel.ordinal.0
                )));
            }
            if i > 0 && order.panels[i - 1].page != panel.page {
                cursor += cfg.page_gap_secs;
            }
            let page = &chapter.pages[panel.page_slot];
            let sources = panel.sources.iter().map(|&s| &page.panels[s]);
            let text_units: usize = sources
                .clone()
                .flat_map(|p| &p.bubbles)
                .map(|b| text_length(&b.text, cfg.language_mode, &chapter.language))
                .sum();
            let objects: usize = sources.map(|p| p.objects.len() + p.characters.len()).sum();
            let dwell = dwell_secs(cfg, text_units, objects);
            slots.push(PanelSlot {
                ordinal: panel.ordinal,
                page: panel.page,
                start: cursor,
                dwell,
            });
            cursor += dwell;
        }
        let panels_end = cursor;

        let mut pending: Vec<Pending> = Vec::new();
        let mut push = |event: TimelineEvent| {
            let seq = pending.len();
            pending.push(Pending { event, seq });
        };

        // Scene regions.
        let boundaries: Vec<usize> = scenes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.boundary)
            .map(|(i, _)| i)
            .collect();
        for (k, &i) in boundaries.iter().enumerate() {
            let start = slots[i].start;
            let end = boundaries
                .get(k + 1)
                .map(|&j| slots[j].start)
                .unwrap_or(panels_end);
            let scene = &scenes[i];
            push(TimelineEvent {
                kind: EventKind::Bgm,
                start,
                duration: end - start,
                panel: slots[i].ordinal,
                source: EventSource::Music {
                    scene: scene.scene.clone(),
                    emotion: scene.emotion.clone(),
                    intensity: scene.intensity,
                },
                identity: None,
                open_ended: true,
            });
        }

        for (panel, slot) in order.panels.iter().zip(&slots) {
            let page = &chapter.pages[panel.page_slot];
            for cue in panel
                .sources
                .iter()
                .flat_map(|&s| &page.panels[s].sound_cues)
            {
                push(TimelineEvent {
                    kind: EventKind::Sfx,
                    start: slot.start,
                    duration: cfg.sfx_nominal_secs,
                    panel: slot.ordinal,
                    source: EventSource::Effect {
                        text: cue.text.clone(),
                        kind: cue.kind,
                        keywords: cue.keywords.clone(),
                    },
                    identity: None,
                    open_ended: false,
                });
            }
        }

        for (panel, slot) in order.panels.iter().zip(&slots) {
            let bubbles: Vec<_> = attributions.for_panel(panel.ordinal).collect();
            let n = bubbles.len().max(1) as f64;
            let emotion = &scenes[panel.ordinal.index()].emotion;
            for attribution in bubbles {
                let src = attribution.source;
                let bubble = &chapter.pages[src.page_slot].panels[src.panel_slot].bubbles
                    [src.bubble_slot];
                if bubble.text.trim().is_empty() {
                    tracing::debug!(bubble = %bubble.id, "skipping bubble without text");
                    continue;
                }
                let units = text_length(&bubble.text, cfg.language_mode, &chapter.language);
                let voice = self.voices.profile(attribution.identity);
                let prosody = prosody_for(&voice, emotion);
                push(TimelineEvent {
                    kind: EventKind::Speech,
                    start: slot.start + f64::from(attribution.rank) * slot.dwell / n,
                    duration: (units as f64 * cfg.speech_secs_per_text_unit)
                        .max(cfg.speech_min_secs),
                    panel: slot.ordinal,
                    source: EventSource::Speech {
                        bubble_id: bubble.id.clone(),
                        text: bubble.text.clone(),
                        voice,
                        prosody,
                    },
                    identity: attribution.identity,
                    open_ended: false,
                });
            }
        }

        separate_same_kind(&mut pending, EventKind::Sfx, cfg.min_event_gap_secs);
        separate_same_kind(&mut pending, EventKind::Speech, cfg.min_event_gap_secs);

        pending.sort_by(|a, b| {
            a.event
                .start
                .total_cmp(&b.event.start)
                .then(a.event.kind.cmp(&b.event.kind))
                .then(a.seq.cmp(&b.seq))
        });

        let latest_start = pending
            .iter()
            .map(|p| p.event.start)
            .fold(f64::NEG_INFINITY, f64::max);
        let mut total_duration = panels_end;
        if latest_start >= total_duration {
            // Pushed point events can spill past the last panel; the chapter grows to hold them.
            total_duration = latest_start + cfg.min_event_gap_secs;
            if let Some(last_bgm) = pending
                .iter_mut()
                .rev()
                .find(|p| p.event.kind == EventKind::Bgm)
            {
                last_bgm.event.duration = total_duration - last_bgm.event.start;
            }
            tracing::debug!(total_duration, "extended chapter to cover pushed events");
        }

        let timeline = Timeline {
            title: chapter.title.clone(),
            chapter: chapter.chapter,
            total_duration,
            panels: slots,
            events: pending.into_iter().map(|p| p.event).collect(),
        };
        timeline.validate()?;

        tracing::info!(
            panels = timeline.panels.len(),
            events = timeline.events.len(),
            total_secs = timeline.total_duration,
            "built timeline"
        );
        Ok(timeline)
    }
}

/// Push later events of `kind` forward so consecutive starts differ by at least `min_gap`.
fn separate_same_kind(pending: &mut [Pending], kind: EventKind, min_gap: f64) {
    let mut idx: Vec<usize> = (0..pending.len())
        .filter(|&i| pending[i].event.kind == kind)
        .collect();
    idx.sort_by(|&a, &b| {
        pending[a]
            .event
            .start
            .total_cmp(&pending[b].event.start)
            .then(pending[a].seq.cmp(&pending[b].seq))
    });
    let mut prev: Option<f64> = None;
    for i in idx {
        let e = &mut pending[i].event;
        if let Some(p) = prev
            && e.start < p + min_gap
        {
            tracing::debug!(kind = ?kind, from = e.start, to = p + min_gap, "pushed colliding event");
            e.start = p + min_gap;
        }
        prev = Some(e.start);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/builder.rs"]
mod tests;

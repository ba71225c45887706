use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::core::{ClusterId, Ordinal, PageIndex};
use crate::foundation::error::{PanelwaveError, PanelwaveResult};
use crate::model::chapter::SoundCueKind;
use crate::voice::{Prosody, VoiceProfile};

/// Audio layer an event belongs to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Bgm,
    Sfx,
    Speech,
}

/// What to synthesize for an event.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventSource {
    /// Background music for a scene region.
    Music {
        scene: String,
        emotion: String,
        intensity: f64,
    },
    /// A sound effect for an onomatopoeia cue.
    Effect {
        text: String,
        kind: SoundCueKind,
        keywords: Vec<String>,
    },
    /// A spoken line.
    Speech {
        bubble_id: String,
        text: String,
        voice: VoiceProfile,
        prosody: Prosody,
    },
}

/// One scheduled event. Times are in seconds from chapter start.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimelineEvent {
    pub kind: EventKind,
    pub start: f64,
    /// Region length for BGM, nominal fragment length for SFX and speech.
    pub duration: f64,
    /// Panel the event is anchored to.
    pub panel: Ordinal,
    pub source: EventSource,
    /// Speaker cluster. Speech only, `None` when unattributed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ClusterId>,
    /// BGM regions are filled by the mixer regardless of fragment length.
    #[serde(default)]
    pub open_ended: bool,
}

impl TimelineEvent {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Reading window of one panel.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PanelSlot {
    pub ordinal: Ordinal,
    pub page: PageIndex,
    pub start: f64,
    pub dwell: f64,
}

/// Immutable, chapter-scoped schedule of audio events.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    pub title: String,
    pub chapter: u32,
    /// Full chapter length. The mix spans exactly this long.
    pub total_duration: f64,
    pub panels: Vec<PanelSlot>,
    /// Ordered by start time, then kind.
    pub events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn from_reader<R: std::io::Read>(r: R) -> PanelwaveResult<Self> {
        let t: Self = serde_json::from_reader(r)
            .map_err(|e| PanelwaveError::serde(format!("parse timeline JSON: {e}")))?;
        t.validate()?;
        Ok(t)
    }

    pub fn from_path(path: impl AsRef<Path>) -> PanelwaveResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PanelwaveError::serde(format!("open timeline '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn to_json_pretty(&self) -> PanelwaveResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PanelwaveError::serde(format!("serialize timeline: {e}")))
    }

    pub fn events_of(&self, kind: EventKind) -> impl Iterator<Item = (usize, &TimelineEvent)> {
        self.events
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.kind == kind)
    }

    /// Check every structural invariant. A violation is an internal bug and aborts the chapter.
    pub fn validate(&self) -> PanelwaveResult<()> {
        if !self.total_duration.is_finite() || self.total_duration < 0.0 {
            return Err(PanelwaveError::timeline_invariant(format!(
                "total duration {} is not a finite non-negative number",
                self.total_duration
            )));
        }

        let mut prev_slot_start = f64::NEG_INFINITY;
        for (i, slot) in self.panels.iter().enumerate() {
            if slot.ordinal.index() != i {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "panel slot {i} carries ordinal {}",
                    slot.ordinal.0
                )));
            }
            if !slot.start.is_finite()
                || !slot.dwell.is_finite()
                || slot.dwell <= 0.0
                || slot.start <= prev_slot_start
            {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "panel {i} start {} / dwell {} breaks strictly increasing panel starts",
                    slot.start, slot.dwell
                )));
            }
            prev_slot_start = slot.start;
        }

        let mut last_start = [f64::NEG_INFINITY; 3];
        let mut speech_starts = HashSet::new();
        let mut prev_event_start = f64::NEG_INFINITY;
        for (i, e) in self.events.iter().enumerate() {
            if e.panel.index() >= self.panels.len() {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "event {i} references panel ordinal {} outside 0..{}",
                    e.panel.0,
                    self.panels.len()
                )));
            }
            if !e.start.is_finite() || e.start < 0.0 || e.start >= self.total_duration {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "event {i} start {} lies outside [0, {})",
                    e.start, self.total_duration
                )));
            }
            if !e.duration.is_finite() || e.duration <= 0.0 {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "event {i} has non-positive duration {}",
                    e.duration
                )));
            }
            if e.start < prev_event_start {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "event {i} starts at {} before its predecessor at {prev_event_start}",
                    e.start
                )));
            }
            prev_event_start = e.start;

            let k = e.kind as usize;
            if e.start < last_start[k] {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "{:?} event {i} starts at {} before the previous {:?} event",
                    e.kind, e.start, e.kind
                )));
            }
            last_start[k] = e.start;

            let kind_matches = matches!(
                (e.kind, &e.source),
                (EventKind::Bgm, EventSource::Music { .. })
                    | (EventKind::Sfx, EventSource::Effect { .. })
                    | (EventKind::Speech, EventSource::Speech { .. })
            );
            if !kind_matches {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "event {i} kind {:?} does not match its source",
                    e.kind
                )));
            }
            if e.kind != EventKind::Speech && e.identity.is_some() {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "non-speech event {i} carries an identity"
                )));
            }
            if e.kind == EventKind::Speech && !speech_starts.insert(e.start.to_bits()) {
                return Err(PanelwaveError::timeline_invariant(format!(
                    "speech event {i} shares start time {} with another speech event",
                    e.start
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/model.rs"]
mod tests;

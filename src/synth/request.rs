use std::collections::BTreeMap;

use xxhash_rust::xxh3::xxh3_64;

use crate::config::TimelineConfig;
use crate::foundation::error::{PanelwaveError, PanelwaveResult};
use crate::timeline::model::{EventKind, EventSource, Timeline, TimelineEvent};

/// What one synthesis call is asked to produce.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SynthesisRequest {
    pub kind: EventKind,
    /// Prompt material for music and effects, text and voice for speech.
    pub source: EventSource,
    /// Requested length in seconds. Speech and effects treat it as a hint.
    pub duration: f64,
}

impl SynthesisRequest {
    /// Request for `event`. BGM asks for at most `bgm_max_request_secs`; the mix loops the rest.
    pub fn for_event(event: &TimelineEvent, cfg: &TimelineConfig) -> Self {
        let duration = match event.kind {
            EventKind::Bgm => event.duration.min(cfg.bgm_max_request_secs),
            EventKind::Sfx | EventKind::Speech => event.duration,
        };
        Self {
            kind: event.kind,
            source: event.source.clone(),
            duration,
        }
    }

    /// Stable content hash, rendered as 16 lowercase hex digits.
    pub fn fingerprint(&self) -> String {
        // Struct field order is fixed, so the JSON encoding is canonical.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:016x}", xxh3_64(&bytes))
    }
}

/// One deduplicated request and the timeline events it serves.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ManifestEntry {
    pub fingerprint: String,
    #[serde(flatten)]
    pub request: SynthesisRequest,
    pub events: Vec<usize>,
}

/// Every distinct synthesis request a timeline needs, in first-use order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RequestManifest {
    pub entries: Vec<ManifestEntry>,
}

impl RequestManifest {
    pub fn build(timeline: &Timeline, cfg: &TimelineConfig) -> Self {
        let mut entries: Vec<ManifestEntry> = Vec::new();
        let mut by_fp: BTreeMap<String, usize> = BTreeMap::new();
        for (i, event) in timeline.events.iter().enumerate() {
            let request = SynthesisRequest::for_event(event, cfg);
            let fingerprint = request.fingerprint();
            match by_fp.get(&fingerprint) {
                Some(&slot) => entries[slot].events.push(i),
                None => {
                    by_fp.insert(fingerprint.clone(), entries.len());
                    entries.push(ManifestEntry {
                        fingerprint,
                        request,
                        events: vec![i],
                    });
                }
            }
        }
        Self { entries }
    }

    /// One entry per event, even when requests repeat.
    pub fn undeduplicated(timeline: &Timeline, cfg: &TimelineConfig) -> Self {
        let entries = timeline
            .events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let request = SynthesisRequest::for_event(event, cfg);
                ManifestEntry {
                    fingerprint: request.fingerprint(),
                    request,
                    events: vec![i],
                }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_pretty(&self) -> PanelwaveResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PanelwaveError::serde(format!("serialize request manifest: {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/synth/request.rs"]
mod tests;

use std::path::Path;

use crate::foundation::error::{PanelwaveError, PanelwaveResult};
use crate::synth::SynthesisError;
use crate::timeline::model::EventKind;

/// Why an event's fragment was unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedCause {
    Timeout,
    Failure,
}

impl From<&SynthesisError> for DegradedCause {
    fn from(e: &SynthesisError) -> Self {
        match e {
            SynthesisError::Timeout { .. } => Self::Timeout,
            SynthesisError::Failure(_) => Self::Failure,
        }
    }
}

/// What the mix used in place of the missing fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Substitution {
    Silence,
    /// An earlier BGM region's fragment was loop-stitched over this region.
    ExtendedBgm { source_event: usize },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DegradedEvent {
    /// Index into `Timeline::events`.
    pub event_index: usize,
    pub kind: EventKind,
    pub cause: DegradedCause,
    pub detail: String,
    pub substitution: Substitution,
}

/// Events whose audio could not be obtained, in timeline order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DegradedReport {
    pub events: Vec<DegradedEvent>,
}

impl DegradedReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.events.iter().map(|e| e.event_index)
    }

    pub fn get(&self, event_index: usize) -> Option<&DegradedEvent> {
        self.events.iter().find(|e| e.event_index == event_index)
    }

    pub(crate) fn push(
        &mut self,
        event_index: usize,
        kind: EventKind,
        error: &SynthesisError,
        substitution: Substitution,
    ) {
        tracing::warn!(
            event = event_index,
            kind = ?kind,
            substitution = ?substitution,
            "degraded event: {error}"
        );
        self.events.push(DegradedEvent {
            event_index,
            kind,
            cause: DegradedCause::from(error),
            detail: error.to_string(),
            substitution,
        });
    }

    pub(crate) fn sort(&mut self) {
        self.events.sort_by_key(|e| e.event_index);
    }

    pub fn to_json_pretty(&self) -> PanelwaveResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PanelwaveError::serde(format!("serialize degraded report: {e}")))
    }

    pub fn write_json(&self, path: &Path) -> PanelwaveResult<()> {
        let json = self.to_json_pretty()?;
        std::fs::write(path, json).map_err(|e| {
            PanelwaveError::Other(
                anyhow::Error::new(e)
                    .context(format!("failed to write degraded report '{}'", path.display())),
            )
        })
    }
}

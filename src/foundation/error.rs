/// Convenience result type used across Panelwave.
pub type PanelwaveResult<T> = Result<T, PanelwaveError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Only [`PanelwaveError::Validation`] and [`PanelwaveError::TimelineInvariant`] abort a chapter.
/// Geometry problems are recovered where they occur and per-event synthesis failures are reported
/// through [`crate::DegradedReport`] instead of being returned.
#[derive(thiserror::Error, Debug)]
pub enum PanelwaveError {
    /// Invalid user-provided input or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Degenerate page geometry that could not be recovered locally.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// A built timeline broke a structural invariant. Indicates an internal bug.
    #[error("timeline invariant violated: {0}")]
    TimelineInvariant(String),

    /// Errors from synthesis plumbing (pool construction, fragment decoding).
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PanelwaveError {
    /// Build a [`PanelwaveError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PanelwaveError::Geometry`] value.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    /// Build a [`PanelwaveError::TimelineInvariant`] value.
    pub fn timeline_invariant(msg: impl Into<String>) -> Self {
        Self::TimelineInvariant(msg.into())
    }

    /// Build a [`PanelwaveError::Synthesis`] value.
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    /// Build a [`PanelwaveError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` when this error must abort the whole chapter run.
    pub fn is_chapter_fatal(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::TimelineInvariant(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;

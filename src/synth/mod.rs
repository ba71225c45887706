//! Bridges timeline events to external audio and voice synthesis services.
//!
//! A [`Synthesizer`] turns one [`SynthesisRequest`] into a [`Fragment`] or an explicit
//! [`SynthesisError`]. [`dispatch::dispatch`] fans requests out over a bounded worker pool with a
//! per-call timeout and settles every event before mixing starts.

pub(crate) mod directory;
pub(crate) mod dispatch;
pub(crate) mod request;

use crate::audio::fragment::Fragment;
use request::SynthesisRequest;

/// Per-event synthesis outcome that did not yield audio.
///
/// Never aborts a chapter; the mix substitutes silence or extended BGM and reports the event.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum SynthesisError {
    #[error("synthesis timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("synthesis failed: {0}")]
    Failure(String),
}

impl SynthesisError {
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::Failure(msg.into())
    }
}

/// External audio/voice synthesis collaborator.
///
/// Implementations must be callable from several worker threads at once. A call that hangs is
/// abandoned by the dispatcher after the configured timeout.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<Fragment, SynthesisError>;
}

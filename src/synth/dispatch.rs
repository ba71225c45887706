use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use rayon::prelude::*;

use crate::audio::fragment::Fragment;
use crate::config::{SynthesisConfig, TimelineConfig};
use crate::foundation::error::{PanelwaveError, PanelwaveResult};
use crate::synth::request::{RequestManifest, SynthesisRequest};
use crate::synth::{SynthesisError, Synthesizer};
use crate::timeline::model::Timeline;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct DispatchStats {
    /// Timeline events that needed a fragment.
    pub events: usize,
    /// Calls issued after deduplication, retries excluded.
    pub requests: usize,
    pub retries: usize,
    pub succeeded: usize,
    pub timed_out: usize,
    pub failed: usize,
}

/// One settled outcome per timeline event, index-aligned with `Timeline::events`.
#[derive(Clone, Debug)]
pub struct SettledFragments {
    pub fragments: Vec<Result<Fragment, SynthesisError>>,
    pub stats: DispatchStats,
}

impl SettledFragments {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Synthesize every event of `timeline` over a bounded worker pool.
///
/// Returns only after every request has settled. Each call is given `timeout_ms` and at most
/// `retries` further attempts; the outcome is then final for all events sharing the request.
#[tracing::instrument(skip_all, fields(title = %timeline.title, chapter = timeline.chapter))]
pub fn dispatch(
    timeline: &Timeline,
    timeline_cfg: &TimelineConfig,
    cfg: &SynthesisConfig,
    synth: Arc<dyn Synthesizer>,
) -> PanelwaveResult<SettledFragments> {
    let manifest = if cfg.dedupe {
        RequestManifest::build(timeline, timeline_cfg)
    } else {
        RequestManifest::undeduplicated(timeline, timeline_cfg)
    };

    let pool = build_thread_pool(Some(cfg.workers))?;
    let gate = CallGate::new(cfg.workers);
    let outcomes: Vec<(Result<Fragment, SynthesisError>, u32)> = pool.install(|| {
        manifest
            .entries
            .par_iter()
            .map(|entry| synthesize_with_retry(&synth, &gate, &entry.request, cfg))
            .collect()
    });

    let mut stats = DispatchStats {
        events: timeline.events.len(),
        requests: manifest.len(),
        ..DispatchStats::default()
    };
    let mut fragments: Vec<Option<Result<Fragment, SynthesisError>>> =
        vec![None; timeline.events.len()];
    for (entry, (outcome, attempts)) in manifest.entries.iter().zip(outcomes) {
        stats.retries += attempts.saturating_sub(1) as usize;
        match &outcome {
            Ok(_) => stats.succeeded += 1,
            Err(SynthesisError::Timeout { .. }) => stats.timed_out += 1,
            Err(SynthesisError::Failure(_)) => stats.failed += 1,
        }
        for &i in &entry.events {
            fragments[i] = Some(outcome.clone());
        }
    }

    let fragments = fragments
        .into_iter()
        .enumerate()
        .map(|(i, f)| {
            f.ok_or_else(|| {
                PanelwaveError::synthesis(format!("event {i} was never dispatched"))
            })
        })
        .collect::<PanelwaveResult<Vec<_>>>()?;

    tracing::info!(
        events = stats.events,
        requests = stats.requests,
        succeeded = stats.succeeded,
        timed_out = stats.timed_out,
        failed = stats.failed,
        "settled synthesis requests"
    );
    Ok(SettledFragments { fragments, stats })
}

/// Counts synthesis calls that are actually running, abandoned ones included.
///
/// A slot is released when the call's thread finishes, not when the dispatcher stops waiting.
#[derive(Debug)]
struct CallGate {
    inner: Arc<(Mutex<usize>, Condvar)>,
    limit: usize,
}

impl CallGate {
    fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new((Mutex::new(0), Condvar::new())),
            limit: limit.max(1),
        }
    }

    /// Block until fewer than `limit` calls are running, then take a slot.
    fn acquire(&self) -> CallSlot {
        let (count, freed) = &*self.inner;
        let mut running = count.lock().unwrap_or_else(PoisonError::into_inner);
        while *running >= self.limit {
            running = freed.wait(running).unwrap_or_else(PoisonError::into_inner);
        }
        *running += 1;
        CallSlot {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CallSlot {
    inner: Arc<(Mutex<usize>, Condvar)>,
}

impl Drop for CallSlot {
    fn drop(&mut self) {
        let (count, freed) = &*self.inner;
        let mut running = count.lock().unwrap_or_else(PoisonError::into_inner);
        *running = running.saturating_sub(1);
        freed.notify_one();
    }
}

fn synthesize_with_retry(
    synth: &Arc<dyn Synthesizer>,
    gate: &CallGate,
    request: &SynthesisRequest,
    cfg: &SynthesisConfig,
) -> (Result<Fragment, SynthesisError>, u32) {
    let attempts = 1 + cfg.retries.min(1);
    let mut attempt = 1;
    loop {
        let outcome = synthesize_once(synth, gate, request, cfg.timeout_ms);
        match &outcome {
            Err(e) if attempt < attempts => {
                tracing::debug!(kind = ?request.kind, attempt, "retrying synthesis: {e}");
                attempt += 1;
            }
            _ => return (outcome, attempt),
        }
    }
}

/// Run one call on its own thread and stop waiting after `timeout_ms`.
///
/// The call starts only once `gate` has a free slot, and the timeout counts from that point. A
/// timed-out call is abandoned but keeps its slot until its thread finishes.
fn synthesize_once(
    synth: &Arc<dyn Synthesizer>,
    gate: &CallGate,
    request: &SynthesisRequest,
    timeout_ms: u64,
) -> Result<Fragment, SynthesisError> {
    let slot = gate.acquire();
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(synth);
    let owned = request.clone();
    std::thread::spawn(move || {
        let _slot = slot;
        let _ = tx.send(worker.synthesize(&owned));
    });

    let fragment = match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok(result) => result?,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            return Err(SynthesisError::Timeout {
                after_ms: timeout_ms,
            });
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            return Err(SynthesisError::failure(
                "synthesizer thread exited without a result",
            ));
        }
    };
    fragment.check().map_err(SynthesisError::Failure)?;
    Ok(fragment)
}

pub(crate) fn build_thread_pool(threads: Option<usize>) -> PanelwaveResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PanelwaveError::synthesis(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/synth/dispatch.rs"]
mod tests;

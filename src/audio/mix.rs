use std::path::Path;

use crate::audio::fragment::Fragment;
use crate::audio::report::{DegradedReport, Substitution};
use crate::audio::stitch::{apply_edge_fades, loop_stitch};
use crate::audio::wav::{write_f32le, write_wav};
use crate::config::{ClipPolicy, MixConfig};
use crate::foundation::core::secs_to_samples;
use crate::foundation::error::{PanelwaveError, PanelwaveResult};
use crate::synth::SynthesisError;
use crate::timeline::model::{EventKind, Timeline};

/// Mix bus a segment is summed into. BGM and SFX share the ducked bed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Bgm,
    Sfx,
    Speech,
}

/// A block of output-format samples placed on the chapter timeline.
#[derive(Clone, Debug)]
pub struct MixSegment {
    pub layer: Layer,
    pub start_frame: usize,
    /// Interleaved at the output rate and channel count.
    pub samples: Vec<f32>,
    pub gain: f32,
}

/// Frames during which a speech fragment is audible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DuckWindow {
    pub start_frame: usize,
    pub end_frame: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct MixStats {
    /// Continuous BGM runs after merging regions that share a fragment.
    pub bgm_runs: usize,
    /// Self-crossfades inserted by loop-stitching.
    pub loop_joins: usize,
    pub sfx_placed: usize,
    pub speech_placed: usize,
    pub degraded: usize,
    /// Peak absolute sample before the clip policy ran.
    pub peak: f32,
}

/// Everything needed to render the chapter, resolved against the output format.
#[derive(Clone, Debug)]
pub struct MixPlan {
    pub sample_rate: u32,
    pub channels: u16,
    pub total_frames: usize,
    pub segments: Vec<MixSegment>,
    pub ducks: Vec<DuckWindow>,
    pub degraded: DegradedReport,
    pub stats: MixStats,
}

/// Final chapter waveform plus what had to be substituted to produce it.
#[derive(Clone, Debug)]
pub struct MixOutput {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
    pub degraded: DegradedReport,
    pub stats: MixStats,
}

impl MixOutput {
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn write_wav(&self, path: &Path) -> PanelwaveResult<()> {
        write_wav(path, self.sample_rate, self.channels, &self.samples)
    }

    pub fn write_f32le(&self, path: &Path) -> PanelwaveResult<()> {
        write_f32le(path, &self.samples)
    }
}

struct Region {
    start: usize,
    end: usize,
    source: Option<usize>,
}

/// Composes settled fragments into one waveform spanning the whole timeline.
pub struct MixEngine<'a> {
    cfg: &'a MixConfig,
}

impl<'a> MixEngine<'a> {
    pub fn new(cfg: &'a MixConfig) -> Self {
        Self { cfg }
    }

    /// Plan and render in one step.
    #[tracing::instrument(skip_all, fields(title = %timeline.title, chapter = timeline.chapter))]
    pub fn mix(
        &self,
        timeline: &Timeline,
        fragments: &[Result<Fragment, SynthesisError>],
    ) -> PanelwaveResult<MixOutput> {
        let plan = self.plan(timeline, fragments)?;
        let out = self.render(plan);
        tracing::info!(
            frames = out.frames(),
            bgm_runs = out.stats.bgm_runs,
            loop_joins = out.stats.loop_joins,
            degraded = out.stats.degraded,
            "mixed chapter"
        );
        Ok(out)
    }

    /// Bind each event to its fragment and resolve BGM runs, stitching and fades.
    ///
    /// `fragments` is index-aligned with `timeline.events`. A failed BGM region reuses the most
    /// recent earlier BGM fragment; failed SFX and speech become silence. Both are reported.
    pub fn plan(
        &self,
        timeline: &Timeline,
        fragments: &[Result<Fragment, SynthesisError>],
    ) -> PanelwaveResult<MixPlan> {
        if fragments.len() != timeline.events.len() {
            return Err(PanelwaveError::validation(format!(
                "{} fragments for {} timeline events",
                fragments.len(),
                timeline.events.len()
            )));
        }
        let cfg = self.cfg;
        let sr = cfg.sample_rate;
        let channels = cfg.channels;
        if sr == 0 || !(1..=2).contains(&channels) {
            return Err(PanelwaveError::validation(format!(
                "unsupported mix format {sr} Hz x {channels} channels"
            )));
        }
        let ch = usize::from(channels);
        let total_frames = secs_to_samples(timeline.total_duration, sr) as usize;
        let frames_at = |secs: f64| (secs_to_samples(secs, sr) as usize).min(total_frames);

        let mut degraded = DegradedReport::default();
        let mut segments = Vec::new();
        let mut ducks = Vec::new();
        let mut stats = MixStats::default();

        // BGM regions tile the chapter; each ends where the next begins.
        let bgm: Vec<usize> = timeline.events_of(EventKind::Bgm).map(|(i, _)| i).collect();
        let mut regions = Vec::with_capacity(bgm.len());
        let mut last_ok: Option<usize> = None;
        for (k, &i) in bgm.iter().enumerate() {
            let event = &timeline.events[i];
            let start = frames_at(event.start);
            let end = match bgm.get(k + 1) {
                Some(&j) => frames_at(timeline.events[j].start),
                None => frames_at(event.end()),
            };
            let source = match &fragments[i] {
                Ok(_) => {
                    last_ok = Some(i);
                    Some(i)
                }
                Err(err) => {
                    let substitution = match last_ok {
                        Some(source_event) => Substitution::ExtendedBgm { source_event },
                        None => Substitution::Silence,
                    };
                    degraded.push(i, EventKind::Bgm, err, substitution);
                    last_ok
                }
            };
            regions.push(Region {
                start,
                end: end.max(start),
                source,
            });
        }

        let mut runs: Vec<Region> = Vec::new();
        for r in regions {
            if let Some(last) = runs.last_mut()
                && last.source.is_some()
                && last.source == r.source
                && last.end == r.start
            {
                last.end = r.end;
                continue;
            }
            runs.push(r);
        }

        // halves[k] is the crossfade half-width at the boundary before run k.
        let half = secs_to_samples(cfg.scene_crossfade_secs / 2.0, sr) as usize;
        let mut halves = vec![0usize; runs.len() + 1];
        for k in 1..runs.len() {
            let (prev, next) = (&runs[k - 1], &runs[k]);
            if prev.source.is_some() && next.source.is_some() && prev.end == next.start {
                halves[k] = half
                    .min(prev.end - prev.start)
                    .min(next.end - next.start);
            }
        }

        let loop_xfade = secs_to_samples(cfg.loop_crossfade_secs, sr) as usize;
        for (k, run) in runs.iter().enumerate() {
            let Some(src) = run.source else { continue };
            let Ok(fragment) = &fragments[src] else {
                continue;
            };
            let seg_start = run.start - halves[k];
            let seg_end = (run.end + halves[k + 1]).min(total_frames);
            if seg_end <= seg_start {
                continue;
            }
            let conformed = fragment.conform(sr, channels);
            let stitched = loop_stitch(&conformed, channels, seg_end - seg_start, loop_xfade);
            let mut samples = stitched.samples;
            apply_edge_fades(&mut samples, channels, 2 * halves[k], 2 * halves[k + 1]);
            tracing::debug!(
                source_event = src,
                start_frame = seg_start,
                frames = seg_end - seg_start,
                joins = stitched.joins,
                "placed bgm run"
            );
            stats.bgm_runs += 1;
            stats.loop_joins += stitched.joins;
            segments.push(MixSegment {
                layer: Layer::Bgm,
                start_frame: seg_start,
                samples,
                gain: cfg.bgm_gain as f32,
            });
        }

        for (i, event) in timeline.events.iter().enumerate() {
            let (layer, gain) = match event.kind {
                EventKind::Bgm => continue,
                EventKind::Sfx => (Layer::Sfx, cfg.sfx_gain as f32),
                EventKind::Speech => (Layer::Speech, cfg.speech_gain as f32),
            };
            let fragment = match &fragments[i] {
                Ok(f) => f,
                Err(err) => {
                    degraded.push(i, event.kind, err, Substitution::Silence);
                    continue;
                }
            };
            let start_frame = frames_at(event.start);
            let mut samples = fragment.conform(sr, channels);
            samples.truncate((total_frames - start_frame) * ch);
            if samples.is_empty() {
                continue;
            }
            if layer == Layer::Speech {
                ducks.push(DuckWindow {
                    start_frame,
                    end_frame: start_frame + samples.len() / ch,
                });
                stats.speech_placed += 1;
            } else {
                stats.sfx_placed += 1;
            }
            segments.push(MixSegment {
                layer,
                start_frame,
                samples,
                gain,
            });
        }

        degraded.sort();
        stats.degraded = degraded.len();
        Ok(MixPlan {
            sample_rate: sr,
            channels,
            total_frames,
            segments,
            ducks,
            degraded,
            stats,
        })
    }

    /// Sum the plan, duck the bed under speech and apply the clip policy.
    pub fn render(&self, plan: MixPlan) -> MixOutput {
        let cfg = self.cfg;
        let ch = usize::from(plan.channels);
        let n = plan.total_frames * ch;
        let mut bed = vec![0.0f32; n];
        let mut voice = vec![0.0f32; n];
        for seg in &plan.segments {
            let dst = match seg.layer {
                Layer::Speech => &mut voice,
                Layer::Bgm | Layer::Sfx => &mut bed,
            };
            let offset = seg.start_frame * ch;
            for (d, s) in dst[offset.min(n)..].iter_mut().zip(&seg.samples) {
                *d += s * seg.gain;
            }
        }

        let envelope = duck_envelope(
            plan.total_frames,
            &plan.ducks,
            cfg.duck_factor as f32,
            secs_to_samples(cfg.duck_attack_secs, plan.sample_rate) as usize,
            secs_to_samples(cfg.duck_release_secs, plan.sample_rate) as usize,
        );

        let mut samples = Vec::with_capacity(n);
        for (f, g) in envelope.iter().enumerate() {
            for c in 0..ch {
                let i = f * ch + c;
                samples.push(bed[i] * g + voice[i]);
            }
        }

        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        match cfg.clip_policy {
            ClipPolicy::PeakNormalize => {
                if peak > 1.0 {
                    let g = 1.0 / peak;
                    for s in &mut samples {
                        *s *= g;
                    }
                    tracing::debug!(peak, "peak-normalized mix");
                }
            }
            ClipPolicy::Clamp => {
                for s in &mut samples {
                    *s = s.clamp(-1.0, 1.0);
                }
            }
        }

        MixOutput {
            sample_rate: plan.sample_rate,
            channels: plan.channels,
            samples,
            degraded: plan.degraded,
            stats: MixStats { peak, ..plan.stats },
        }
    }
}

/// Per-frame bed gain: `factor` under speech, linear ramps of `attack` frames before and
/// `release` frames after each window. Overlapping windows take the lower gain.
pub(crate) fn duck_envelope(
    total_frames: usize,
    windows: &[DuckWindow],
    factor: f32,
    attack: usize,
    release: usize,
) -> Vec<f32> {
    let mut env = vec![1.0f32; total_frames];
    let depth = 1.0 - factor;
    for w in windows {
        let s = w.start_frame.min(total_frames);
        let e = w.end_frame.clamp(s, total_frames);
        for f in s.saturating_sub(attack)..s {
            let g = factor + depth * (s - f) as f32 / (attack + 1) as f32;
            env[f] = env[f].min(g);
        }
        for v in &mut env[s..e] {
            *v = v.min(factor);
        }
        for f in e..(e + release).min(total_frames) {
            let g = factor + depth * (f - e + 1) as f32 / (release + 1) as f32;
            env[f] = env[f].min(g);
        }
    }
    env
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;

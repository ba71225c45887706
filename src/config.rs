//! Pipeline configuration.
//!
//! Every tunable threshold used by the core lives here. All fields carry serde defaults, so `{}`
//! is a valid configuration document.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::error::{PanelwaveError, PanelwaveResult};

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Complete configuration for one chapter run.
pub struct PipelineConfig {
    /// Reading-order resolution.
    pub layout: LayoutConfig,
    /// Online identity clustering.
    pub identity: IdentityConfig,
    /// Speaker attribution cascade.
    pub speaker: SpeakerConfig,
    /// Dwell model and event emission.
    pub timeline: TimelineConfig,
    /// External synthesis dispatch.
    pub synthesis: SynthesisConfig,
    /// Final mix.
    pub mix: MixConfig,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Reading-order resolver settings. Lengths are in normalized page units.
pub struct LayoutConfig {
    /// Minimum band thickness for a gutter to count as a split candidate.
    pub min_gutter: f64,
    /// How far a panel may intrude into a gutter band and still leave it "clean".
    pub intrusion_tolerance: f64,
    /// Gutter widths closer than this are treated as equally wide.
    pub width_tie_epsilon: f64,
    /// Grid size used to quantize corners in the fallback sort.
    pub corner_quantum: f64,
    /// Share of a smaller panel's area that must lie inside a larger one for it to read as an
    /// embedded inset.
    pub nest_overlap: f64,
    /// Minimum mean panel width (fraction of page width) for 4-koma auto-detection.
    pub four_koma_width_ratio: f64,
    /// Distance from the binding edge within which a panel "touches" it.
    pub binding_edge_tolerance: f64,
    /// Recursion guard for the gutter partition.
    pub max_depth: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_gutter: 0.0,
            intrusion_tolerance: 0.002,
            width_tie_epsilon: 1e-3,
            corner_quantum: 0.01,
            nest_overlap: 0.95,
            four_koma_width_ratio: 0.8,
            binding_edge_tolerance: 0.02,
            max_depth: 32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Identity tracker settings.
pub struct IdentityConfig {
    /// Cosine similarity at or above which a detection joins an existing cluster.
    pub assign_threshold: f64,
    /// Stricter cosine similarity at or above which two clusters are unified.
    pub merge_threshold: f64,
    /// Run a merge pass after every N panels. `0` merges only at chapter end.
    pub merge_every_panels: u32,
    /// Exponential recency weight for centroid updates. `None` keeps a plain running mean.
    pub recency_decay: Option<f64>,
    /// Similarities within this distance of the assignment threshold are logged as ambiguous.
    pub ambiguity_margin: f64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            assign_threshold: 0.75,
            merge_threshold: 0.9,
            merge_every_panels: 8,
            recency_decay: None,
            ambiguity_margin: 0.03,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Speaker assigner settings.
pub struct SpeakerConfig {
    /// Maximum angle between the tail ray and a character center, in degrees.
    pub tail_angle_tolerance_deg: f64,
    /// Confidence for a perfectly aligned tail match.
    pub tail_confidence_max: f64,
    /// Confidence for a tail match at the edge of the tolerance cone.
    pub tail_confidence_min: f64,
    /// Maximum bubble-to-character distance (normalized) for the nearest rule.
    pub nearest_max_distance: f64,
    /// Confidence for a nearest match at distance zero.
    pub nearest_confidence_max: f64,
    /// Confidence for a nearest match at the maximum distance.
    pub nearest_confidence_min: f64,
    /// Minimum confidence of the previous bubble for carry-over ("medium").
    pub medium_confidence: f64,
    /// Confidence assigned to a carried-over attribution ("low").
    pub carry_over_confidence: f64,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            tail_angle_tolerance_deg: 25.0,
            tail_confidence_max: 0.95,
            tail_confidence_min: 0.7,
            nearest_max_distance: 0.35,
            nearest_confidence_max: 0.6,
            nearest_confidence_min: 0.35,
            medium_confidence: 0.35,
            carry_over_confidence: 0.2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
/// How text length is measured for the dwell model.
pub enum LanguageMode {
    /// Characters for CJK chapter languages, words otherwise.
    #[default]
    Auto,
    /// Count Unicode scalar values (whitespace excluded).
    Characters,
    /// Count whitespace-separated words.
    Words,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Timeline builder settings. Durations are in seconds.
pub struct TimelineConfig {
    /// Dwell time per unit of text (character or word).
    pub secs_per_text_unit: f64,
    /// Dwell time per detected object.
    pub secs_per_object: f64,
    /// Lower dwell clamp. Must be > 0 so no panel collapses.
    pub min_dwell_secs: f64,
    /// Upper dwell clamp.
    pub max_dwell_secs: f64,
    /// Silence inserted between pages.
    pub page_gap_secs: f64,
    /// Minimum separation between two same-kind point events.
    pub min_event_gap_secs: f64,
    /// Text length measure.
    pub language_mode: LanguageMode,
    /// Requested duration for sound effects.
    pub sfx_nominal_secs: f64,
    /// Estimated speech time per unit of text.
    pub speech_secs_per_text_unit: f64,
    /// Lower bound on estimated speech duration.
    pub speech_min_secs: f64,
    /// Longest BGM fragment requested from the synthesizer; longer regions are loop-stitched.
    pub bgm_max_request_secs: f64,
    /// Scene label used when a panel carries no semantic tags and has no predecessor.
    pub fallback_scene: String,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            secs_per_text_unit: 0.06,
            secs_per_object: 0.4,
            min_dwell_secs: 2.0,
            max_dwell_secs: 30.0,
            page_gap_secs: 0.0,
            min_event_gap_secs: 0.05,
            language_mode: LanguageMode::Auto,
            sfx_nominal_secs: 2.0,
            speech_secs_per_text_unit: 0.12,
            speech_min_secs: 0.6,
            bgm_max_request_secs: 30.0,
            fallback_scene: "unknown".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// External synthesis dispatch settings.
pub struct SynthesisConfig {
    /// Size of the bounded worker pool.
    pub workers: usize,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries after a failed or timed-out call. At most 1.
    pub retries: u32,
    /// Dispatch identical requests once and share the fragment.
    pub dedupe: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout_ms: 30_000,
            retries: 1,
            dedupe: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
/// What to do when the summed mix exceeds full scale.
pub enum ClipPolicy {
    /// Scale the whole mix down so the peak sits at full scale.
    #[default]
    PeakNormalize,
    /// Hard-clamp each sample to `[-1, 1]`.
    Clamp,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Mix engine settings.
pub struct MixConfig {
    /// Output sample rate.
    pub sample_rate: u32,
    /// Output channel count (1 or 2).
    pub channels: u16,
    /// Crossfade width used when loop-stitching a BGM fragment onto itself.
    pub loop_crossfade_secs: f64,
    /// Crossfade width straddling a scene-boundary BGM transition.
    pub scene_crossfade_secs: f64,
    /// Background gain multiplier while speech is active.
    pub duck_factor: f64,
    /// Fade into the ducked level.
    pub duck_attack_secs: f64,
    /// Fade back to full level after speech ends.
    pub duck_release_secs: f64,
    /// BGM layer gain.
    pub bgm_gain: f64,
    /// SFX layer gain.
    pub sfx_gain: f64,
    /// Speech layer gain.
    pub speech_gain: f64,
    /// Overload handling for the summed output.
    pub clip_policy: ClipPolicy,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            loop_crossfade_secs: 1.0,
            scene_crossfade_secs: 2.0,
            duck_factor: 0.35,
            duck_attack_secs: 0.05,
            duck_release_secs: 0.3,
            bgm_gain: 0.7,
            sfx_gain: 1.0,
            speech_gain: 1.0,
            clip_policy: ClipPolicy::PeakNormalize,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from a JSON reader. Missing fields take defaults.
    pub fn from_reader<R: std::io::Read>(r: R) -> PanelwaveResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| PanelwaveError::validation(format!("parse pipeline config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a configuration from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> PanelwaveResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PanelwaveError::validation(format!("open pipeline config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Validate ranges of every section.
    pub fn validate(&self) -> PanelwaveResult<()> {
        let l = &self.layout;
        non_negative(l.min_gutter, "layout.min_gutter")?;
        non_negative(l.intrusion_tolerance, "layout.intrusion_tolerance")?;
        non_negative(l.width_tie_epsilon, "layout.width_tie_epsilon")?;
        positive(l.corner_quantum, "layout.corner_quantum")?;
        unit_interval(l.nest_overlap, "layout.nest_overlap")?;
        unit_interval(l.four_koma_width_ratio, "layout.four_koma_width_ratio")?;
        non_negative(l.binding_edge_tolerance, "layout.binding_edge_tolerance")?;
        if l.max_depth == 0 {
            return Err(PanelwaveError::validation("layout.max_depth must be > 0"));
        }

        let i = &self.identity;
        similarity(i.assign_threshold, "identity.assign_threshold")?;
        similarity(i.merge_threshold, "identity.merge_threshold")?;
        if i.merge_threshold < i.assign_threshold {
            return Err(PanelwaveError::validation(
                "identity.merge_threshold must be >= identity.assign_threshold",
            ));
        }
        if let Some(d) = i.recency_decay
            && (!d.is_finite() || d <= 0.0 || d >= 1.0)
        {
            return Err(PanelwaveError::validation(
                "identity.recency_decay must be in (0, 1) when set",
            ));
        }
        non_negative(i.ambiguity_margin, "identity.ambiguity_margin")?;

        let s = &self.speaker;
        if !s.tail_angle_tolerance_deg.is_finite()
            || s.tail_angle_tolerance_deg <= 0.0
            || s.tail_angle_tolerance_deg >= 90.0
        {
            return Err(PanelwaveError::validation(
                "speaker.tail_angle_tolerance_deg must be in (0, 90)",
            ));
        }
        for (name, v) in [
            ("speaker.tail_confidence_max", s.tail_confidence_max),
            ("speaker.tail_confidence_min", s.tail_confidence_min),
            ("speaker.nearest_confidence_max", s.nearest_confidence_max),
            ("speaker.nearest_confidence_min", s.nearest_confidence_min),
            ("speaker.medium_confidence", s.medium_confidence),
            ("speaker.carry_over_confidence", s.carry_over_confidence),
        ] {
            unit_interval(v, name)?;
        }
        if s.tail_confidence_min > s.tail_confidence_max
            || s.nearest_confidence_min > s.nearest_confidence_max
        {
            return Err(PanelwaveError::validation(
                "speaker confidence ranges must satisfy min <= max",
            ));
        }
        positive(s.nearest_max_distance, "speaker.nearest_max_distance")?;

        let t = &self.timeline;
        non_negative(t.secs_per_text_unit, "timeline.secs_per_text_unit")?;
        non_negative(t.secs_per_object, "timeline.secs_per_object")?;
        positive(t.min_dwell_secs, "timeline.min_dwell_secs")?;
        positive(t.max_dwell_secs, "timeline.max_dwell_secs")?;
        if t.max_dwell_secs < t.min_dwell_secs {
            return Err(PanelwaveError::validation(
                "timeline.max_dwell_secs must be >= timeline.min_dwell_secs",
            ));
        }
        non_negative(t.page_gap_secs, "timeline.page_gap_secs")?;
        positive(t.min_event_gap_secs, "timeline.min_event_gap_secs")?;
        positive(t.sfx_nominal_secs, "timeline.sfx_nominal_secs")?;
        non_negative(t.speech_secs_per_text_unit, "timeline.speech_secs_per_text_unit")?;
        positive(t.speech_min_secs, "timeline.speech_min_secs")?;
        positive(t.bgm_max_request_secs, "timeline.bgm_max_request_secs")?;
        if t.fallback_scene.trim().is_empty() {
            return Err(PanelwaveError::validation(
                "timeline.fallback_scene must be non-empty",
            ));
        }

        let y = &self.synthesis;
        if y.workers == 0 {
            return Err(PanelwaveError::validation("synthesis.workers must be >= 1"));
        }
        if y.timeout_ms == 0 {
            return Err(PanelwaveError::validation("synthesis.timeout_ms must be > 0"));
        }
        if y.retries > 1 {
            return Err(PanelwaveError::validation("synthesis.retries must be 0 or 1"));
        }

        let m = &self.mix;
        if m.sample_rate == 0 {
            return Err(PanelwaveError::validation("mix.sample_rate must be > 0"));
        }
        if !(1..=2).contains(&m.channels) {
            return Err(PanelwaveError::validation("mix.channels must be 1 or 2"));
        }
        non_negative(m.loop_crossfade_secs, "mix.loop_crossfade_secs")?;
        non_negative(m.scene_crossfade_secs, "mix.scene_crossfade_secs")?;
        unit_interval(m.duck_factor, "mix.duck_factor")?;
        non_negative(m.duck_attack_secs, "mix.duck_attack_secs")?;
        non_negative(m.duck_release_secs, "mix.duck_release_secs")?;
        non_negative(m.bgm_gain, "mix.bgm_gain")?;
        non_negative(m.sfx_gain, "mix.sfx_gain")?;
        non_negative(m.speech_gain, "mix.speech_gain")?;
        Ok(())
    }
}

fn non_negative(v: f64, field: &str) -> PanelwaveResult<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(PanelwaveError::validation(format!(
            "{field} must be finite and >= 0"
        )));
    }
    Ok(())
}

fn positive(v: f64, field: &str) -> PanelwaveResult<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(PanelwaveError::validation(format!(
            "{field} must be finite and > 0"
        )));
    }
    Ok(())
}

fn unit_interval(v: f64, field: &str) -> PanelwaveResult<()> {
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(PanelwaveError::validation(format!(
            "{field} must be in [0, 1]"
        )));
    }
    Ok(())
}

fn similarity(v: f64, field: &str) -> PanelwaveResult<()> {
    if !v.is_finite() || !(-1.0..=1.0).contains(&v) {
        return Err(PanelwaveError::validation(format!(
            "{field} must be in [-1, 1]"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;

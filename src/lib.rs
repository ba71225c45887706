//! Panelwave turns the panel layout of comic chapters into a scheduled, mixed audio program.
//!
//! The vision and semantic tagging services describe each page: panel boxes, character
//! detections with embeddings, speech bubbles, sound cues and scene tags. Panelwave makes the
//! structural and temporal decisions on top of those signals and composes externally
//! synthesized audio into one continuous waveform.
//!
//! # Pipeline overview
//!
//! 1. **Order**: [`ReadingOrderResolver`] splits each page along gutters (right before left,
//!    top before bottom) and concatenates pages into chapter ordinals.
//! 2. **Identify**: [`IdentityTracker`] clusters character embeddings online, in reading order,
//!    against an [`IdentityStore`] that may carry clusters from earlier chapters.
//! 3. **Attribute**: [`attribute`] runs the tail / nearest / carry-over cascade per bubble.
//! 4. **Schedule**: [`TimelineBuilder`] derives panel dwell times and emits BGM, SFX and
//!    speech events into an immutable [`Timeline`].
//! 5. **Synthesize**: [`dispatch`] fans requests out to a [`Synthesizer`] over a bounded pool
//!    with timeouts and one retry.
//! 6. **Mix**: [`MixEngine`] loop-stitches BGM, layers effects and speech, ducks the bed and
//!    reports substituted events in a [`DegradedReport`].
//!
//! [`run_chapter`] runs all six stages. Only invalid input and timeline invariant violations
//! abort a chapter; geometry and synthesis problems are recovered and reported.
#![forbid(unsafe_code)]

mod audio;
mod config;
mod foundation;
mod geometry;
mod identity;
mod layout;
mod model;
mod pipeline;
mod speaker;
mod synth;
mod timeline;
mod voice;

pub use audio::fragment::Fragment;
pub use audio::mix::{
    DuckWindow, Layer, MixEngine, MixOutput, MixPlan, MixSegment, MixStats,
};
pub use audio::report::{DegradedCause, DegradedEvent, DegradedReport, Substitution};
pub use audio::stitch::{Stitched, apply_edge_fades, loop_stitch};
pub use audio::wav::{read_wav, write_f32le, write_wav};
pub use config::{
    ClipPolicy, IdentityConfig, LanguageMode, LayoutConfig, MixConfig, PipelineConfig,
    SpeakerConfig, SynthesisConfig, TimelineConfig,
};
pub use foundation::core::{
    ClusterId, Ordinal, PageIndex, Point, Rect, UNIT_PAGE, Vec2, samples_to_secs,
    secs_to_samples,
};
pub use foundation::error::{PanelwaveError, PanelwaveResult};
pub use geometry::index::{GeometryIndex, Gutter, GutterAxis};
pub use identity::registry::{IdentityRegistry, lock_store};
pub use identity::store::{
    ClusterSnapshot, ClusterState, IdentityCluster, IdentitySnapshot, IdentityStore,
};
pub use identity::tracker::{
    IdentityAssignments, IdentityTracker, TrackerStats, cosine_similarity, track_chapter,
};
pub use layout::reading_order::{
    OrderedPanel, ReadingOrder, ReadingOrderResolver, SpreadContinuity, VisionContinuity,
    detect_four_koma,
};
pub use model::chapter::{
    BubbleInput, ChapterInput, CharacterInput, PageInput, PanelInput, PanelTags, SoundCueInput,
    SoundCueKind,
};
pub use model::scene::{PanelScene, resolve_scenes};
pub use pipeline::chapter::{
    ChapterOutput, ChapterPlan, plan_chapter, plan_chapter_in, render_plan, run_chapter,
    run_chapter_in, run_chapters,
};
pub use speaker::assign::{
    Attribution, AttributionMethod, BubbleCue, Candidate, PreviousBubble, attribute,
};
pub use speaker::chapter::{
    BubbleAttribution, BubbleRef, ChapterAttributions, attribute_chapter, ranked_bubbles,
};
pub use synth::directory::DirectorySynthesizer;
pub use synth::dispatch::{DispatchStats, SettledFragments, dispatch};
pub use synth::request::{ManifestEntry, RequestManifest, SynthesisRequest};
pub use synth::{SynthesisError, Synthesizer};
pub use timeline::builder::{TimelineBuilder, dwell_secs, is_cjk_language, text_length};
pub use timeline::model::{EventKind, EventSource, PanelSlot, Timeline, TimelineEvent};
pub use voice::{Prosody, VoiceProfile, VoiceRegistry, emotion_adjustment, prosody_for};

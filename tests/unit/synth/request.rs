use super::*;
use crate::foundation::core::{Ordinal, PageIndex};
use crate::model::chapter::SoundCueKind;
use crate::timeline::model::PanelSlot;

fn music(start: f64, duration: f64) -> TimelineEvent {
    TimelineEvent {
        kind: EventKind::Bgm,
        start,
        duration,
        panel: Ordinal(0),
        source: EventSource::Music {
            scene: "street".to_string(),
            emotion: "calm".to_string(),
            intensity: 0.5,
        },
        identity: None,
        open_ended: true,
    }
}

fn effect(start: f64, text: &str) -> TimelineEvent {
    TimelineEvent {
        kind: EventKind::Sfx,
        start,
        duration: 1.0,
        panel: Ordinal(0),
        source: EventSource::Effect {
            text: text.to_string(),
            kind: SoundCueKind::Giongo,
            keywords: vec!["impact".to_string()],
        },
        identity: None,
        open_ended: false,
    }
}

fn timeline(events: Vec<TimelineEvent>) -> Timeline {
    Timeline {
        title: "t".to_string(),
        chapter: 1,
        total_duration: 100.0,
        panels: vec![PanelSlot {
            ordinal: Ordinal(0),
            page: PageIndex(0),
            start: 0.0,
            dwell: 100.0,
        }],
        events,
    }
}

#[test]
fn bgm_requests_are_capped() {
    let cfg = TimelineConfig::default();
    let long = SynthesisRequest::for_event(&music(0.0, 95.0), &cfg);
    assert_eq!(long.duration, cfg.bgm_max_request_secs);
    let short = SynthesisRequest::for_event(&music(0.0, 4.0), &cfg);
    assert_eq!(short.duration, 4.0);
}

#[test]
fn fingerprint_depends_on_content_not_timing() {
    let cfg = TimelineConfig::default();
    let a = SynthesisRequest::for_event(&effect(1.0, "ドン"), &cfg);
    let b = SynthesisRequest::for_event(&effect(7.0, "ドン"), &cfg);
    let c = SynthesisRequest::for_event(&effect(1.0, "バン"), &cfg);
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), c.fingerprint());
    assert_eq!(a.fingerprint().len(), 16);
}

#[test]
fn manifest_groups_identical_requests() {
    let cfg = TimelineConfig::default();
    let tl = timeline(vec![
        music(0.0, 10.0),
        effect(1.0, "ドン"),
        effect(2.0, "バン"),
        effect(3.0, "ドン"),
    ]);
    let m = RequestManifest::build(&tl, &cfg);
    assert_eq!(m.len(), 3);
    assert_eq!(m.entries[1].events, vec![1, 3]);
    assert_eq!(m.entries[2].events, vec![2]);

    let all = RequestManifest::undeduplicated(&tl, &cfg);
    assert_eq!(all.len(), 4);
}

#[test]
fn manifest_json_lists_fingerprints() {
    let cfg = TimelineConfig::default();
    let tl = timeline(vec![effect(0.0, "ドン")]);
    let m = RequestManifest::build(&tl, &cfg);
    let json = m.to_json_pretty().unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["entries"][0]["fingerprint"], m.entries[0].fingerprint.as_str());
    assert_eq!(v["entries"][0]["kind"], "sfx");
    assert_eq!(v["entries"][0]["source"]["type"], "effect");
}

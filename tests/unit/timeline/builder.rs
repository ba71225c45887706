use super::*;
use crate::config::{IdentityConfig, LayoutConfig, SpeakerConfig};
use crate::foundation::core::{Ordinal, PageIndex, Rect};
use crate::identity::store::IdentityStore;
use crate::identity::tracker::track_chapter;
use crate::layout::reading_order::ReadingOrderResolver;
use crate::model::chapter::{
    BubbleInput, PageInput, PanelInput, PanelTags, SoundCueInput, SoundCueKind,
};
use crate::model::scene::resolve_scenes;
use crate::speaker::chapter::attribute_chapter;

fn panel(id: &str, y0: f64, scene: &str) -> PanelInput {
    PanelInput {
        id: id.to_string(),
        bbox: Rect::new(0.05, y0, 0.95, y0 + 0.2),
        polygon: None,
        objects: Vec::new(),
        characters: Vec::new(),
        bubbles: Vec::new(),
        sound_cues: Vec::new(),
        tags: Some(PanelTags {
            scene: scene.to_string(),
            emotion: "calm".to_string(),
            intensity: 0.5,
        }),
    }
}

fn bubble(id: &str, x0: f64, y0: f64, text: &str) -> BubbleInput {
    BubbleInput {
        id: id.to_string(),
        bbox: Rect::new(x0, y0, x0 + 0.1, y0 + 0.05),
        text: text.to_string(),
        tail: None,
    }
}

fn cue(text: &str) -> SoundCueInput {
    SoundCueInput {
        text: text.to_string(),
        kind: SoundCueKind::Giongo,
        keywords: vec!["impact".to_string()],
    }
}

fn plan(chapter: &ChapterInput, cfg: &TimelineConfig) -> PanelwaveResult<Timeline> {
    let layout = LayoutConfig::default();
    let order = ReadingOrderResolver::new(&layout).resolve_chapter(chapter);
    let mut store = IdentityStore::new();
    let (ids, _) = track_chapter(&IdentityConfig::default(), &mut store, chapter, &order)?;
    let scenes = resolve_scenes(chapter, &order, &cfg.fallback_scene);
    let attributions = attribute_chapter(
        &layout,
        &SpeakerConfig::default(),
        chapter,
        &order,
        &scenes,
        &ids,
    );
    let voices = VoiceRegistry::new(chapter.title.clone());
    TimelineBuilder::new(cfg, &voices).build(chapter, &order, &scenes, &attributions)
}

fn fixture() -> ChapterInput {
    let mut p0 = panel("p0", 0.0, "street");
    p0.bubbles = vec![
        bubble("b-left", 0.1, 0.05, "あいうえお"),
        bubble("b-right", 0.7, 0.05, "かきくけこさしすせそ"),
    ];
    p0.sound_cues = vec![cue("ドン"), cue("バン")];
    let p1 = panel("p1", 0.25, "street");
    let mut p2 = panel("p2", 0.5, "cafe");
    p2.objects = vec![Rect::new(0.1, 0.55, 0.2, 0.6); 3];
    ChapterInput {
        title: "t".to_string(),
        chapter: 1,
        language: "ja".to_string(),
        pages: vec![
            PageInput {
                index: PageIndex(0),
                four_koma: Some(false),
                spread_with_next: None,
                panels: vec![p0, p1, p2],
            },
            PageInput {
                index: PageIndex(1),
                four_koma: None,
                spread_with_next: None,
                panels: vec![panel("p3", 0.1, "cafe")],
            },
        ],
    }
}

#[test]
fn text_length_follows_language() {
    assert_eq!(text_length("こんにちは 世界", LanguageMode::Auto, "ja"), 7);
    assert_eq!(text_length("hello brave new world", LanguageMode::Auto, "en"), 4);
    assert_eq!(text_length("hello world", LanguageMode::Characters, "en"), 10);
    assert_eq!(text_length("你好 世界", LanguageMode::Words, "zh-Hans"), 2);
    assert!(is_cjk_language("ko_KR"));
    assert!(!is_cjk_language("de"));
}

#[test]
fn dwell_is_clamped() {
    let cfg = TimelineConfig::default();
    assert_eq!(dwell_secs(&cfg, 0, 0), cfg.min_dwell_secs);
    assert_eq!(dwell_secs(&cfg, 10_000, 0), cfg.max_dwell_secs);
    assert!((dwell_secs(&cfg, 50, 2) - 3.8).abs() < 1e-9);
}

#[test]
fn panels_advance_cumulatively_with_page_gap() {
    let cfg = TimelineConfig {
        page_gap_secs: 0.5,
        ..TimelineConfig::default()
    };
    let t = plan(&fixture(), &cfg).unwrap();
    let starts: Vec<f64> = t.panels.iter().map(|p| p.start).collect();
    assert_eq!(t.panels.len(), 4);
    assert_eq!(starts[0], 0.0);
    assert_eq!(starts[1], 2.0);
    assert_eq!(starts[2], 4.0);
    // Three objects: 1.2s, clamped up to the minimum.
    assert_eq!(t.panels[2].dwell, 2.0);
    assert_eq!(starts[3], 6.5);
    assert_eq!(t.total_duration, 8.5);
}

#[test]
fn bgm_regions_cover_scene_runs() {
    let t = plan(&fixture(), &TimelineConfig::default()).unwrap();
    let bgm: Vec<&TimelineEvent> = t.events_of(EventKind::Bgm).map(|(_, e)| e).collect();
    assert_eq!(bgm.len(), 2);
    assert_eq!((bgm[0].start, bgm[0].duration), (0.0, 4.0));
    assert_eq!((bgm[1].start, bgm[1].duration), (4.0, 4.0));
    assert!(bgm.iter().all(|e| e.open_ended && e.identity.is_none()));
    assert_eq!(bgm[1].panel, Ordinal(2));
    match &bgm[1].source {
        EventSource::Music { scene, .. } => assert_eq!(scene, "cafe"),
        other => panic!("unexpected source {other:?}"),
    }
}

#[test]
fn point_events_are_offset_and_separated() {
    let cfg = TimelineConfig::default();
    let t = plan(&fixture(), &cfg).unwrap();

    let sfx: Vec<f64> = t.events_of(EventKind::Sfx).map(|(_, e)| e.start).collect();
    assert_eq!(sfx, vec![0.0, cfg.min_event_gap_secs]);

    let speech: Vec<&TimelineEvent> = t.events_of(EventKind::Speech).map(|(_, e)| e).collect();
    assert_eq!(speech.len(), 2);
    // Right bubble reads first and starts with the panel; the second is offset by half the dwell.
    let dwell = t.panels[0].dwell;
    assert_eq!(speech[0].start, 0.0);
    assert!((speech[1].start - dwell / 2.0).abs() < 1e-9);
    match &speech[0].source {
        EventSource::Speech { bubble_id, voice, prosody, .. } => {
            assert_eq!(bubble_id, "b-right");
            assert_eq!(voice.voice_id, "narrator");
            assert_eq!(prosody.emotion, "calm");
        }
        other => panic!("unexpected source {other:?}"),
    }
    // Ten characters at 0.12s each.
    assert!((speech[0].duration - 1.2).abs() < 1e-9);
    assert!((speech[1].duration - 0.6).abs() < 1e-9);
}

#[test]
fn collisions_push_later_speech_forward() {
    let mut chapter = fixture();
    // Pack many short bubbles into one minimal-dwell panel so offsets fall under the gap.
    chapter.pages[0].panels[1].bubbles = (0..60)
        .map(|i| bubble(&format!("x{i}"), 0.05 + 0.01 * f64::from(i % 10), 0.3, "あ"))
        .collect();
    let cfg = TimelineConfig {
        max_dwell_secs: 2.0,
        ..TimelineConfig::default()
    };
    let t = plan(&chapter, &cfg).unwrap();
    let starts: Vec<f64> = t.events_of(EventKind::Speech).map(|(_, e)| e.start).collect();
    for w in starts.windows(2) {
        assert!(w[1] - w[0] >= cfg.min_event_gap_secs - 1e-12, "{w:?}");
    }
    t.validate().unwrap();
}

#[test]
fn blank_bubbles_produce_no_speech() {
    let mut chapter = fixture();
    chapter.pages[0].panels[0].bubbles[0].text = "   ".to_string();
    let t = plan(&chapter, &TimelineConfig::default()).unwrap();
    assert_eq!(t.events_of(EventKind::Speech).count(), 1);
}

use super::*;
use crate::config::IdentityConfig;
use crate::foundation::core::{PageIndex, Rect, Vec2};
use crate::identity::store::IdentityStore;
use crate::identity::tracker::track_chapter;
use crate::layout::reading_order::ReadingOrderResolver;
use crate::model::chapter::{CharacterInput, PageInput, PanelInput};
use crate::model::scene::resolve_scenes;

fn bubble(id: &str, x0: f64, y0: f64, tail: Option<Vec2>) -> BubbleInput {
    BubbleInput {
        id: id.to_string(),
        bbox: Rect::new(x0, y0, x0 + 0.1, y0 + 0.05),
        text: format!("line {id}"),
        tail,
    }
}

fn fixture() -> ChapterInput {
    let hero = CharacterInput {
        id: "hero".to_string(),
        bbox: Rect::new(0.6, 0.2, 0.8, 0.4),
        embedding: vec![1.0, 0.0],
    };
    ChapterInput {
        title: "t".to_string(),
        chapter: 1,
        language: "en".to_string(),
        pages: vec![PageInput {
            index: PageIndex(0),
            four_koma: Some(false),
            spread_with_next: None,
            panels: vec![
                PanelInput {
                    id: "top".to_string(),
                    bbox: Rect::new(0.0, 0.0, 1.0, 0.45),
                    polygon: None,
                    objects: Vec::new(),
                    characters: vec![hero],
                    // Listed out of reading order: the right bubble reads first.
                    bubbles: vec![
                        bubble("left", 0.1, 0.05, None),
                        bubble("right", 0.65, 0.05, Some(Vec2::new(0.0, 1.0))),
                    ],
                    sound_cues: Vec::new(),
                    tags: None,
                },
                PanelInput {
                    id: "bottom".to_string(),
                    bbox: Rect::new(0.0, 0.5, 1.0, 1.0),
                    polygon: None,
                    objects: Vec::new(),
                    characters: Vec::new(),
                    bubbles: vec![bubble("offscreen", 0.4, 0.6, None)],
                    sound_cues: Vec::new(),
                    tags: None,
                },
            ],
        }],
    }
}

#[test]
fn bubbles_ranked_in_reading_order_and_carry_over_does_not_chain() {
    let chapter = fixture();
    let layout = LayoutConfig::default();
    let order = ReadingOrderResolver::new(&layout).resolve_chapter(&chapter);
    let mut store = IdentityStore::new();
    let (ids, _) =
        track_chapter(&IdentityConfig::default(), &mut store, &chapter, &order).unwrap();
    let scenes = resolve_scenes(&chapter, &order, "unknown");
    let cfg = SpeakerConfig::default();

    let out = attribute_chapter(&layout, &cfg, &chapter, &order, &scenes, &ids);
    let got: Vec<(&str, u32, AttributionMethod)> = out
        .bubbles
        .iter()
        .map(|b| (b.bubble_id.as_str(), b.rank, b.method))
        .collect();
    assert_eq!(
        got,
        vec![
            ("right", 0, AttributionMethod::TailMatched),
            ("left", 1, AttributionMethod::CarriedOver),
            ("offscreen", 0, AttributionMethod::Unattributed),
        ]
    );
    let hero = ids.get("hero");
    assert_eq!(out.bubbles[0].identity, hero);
    assert_eq!(out.bubbles[0].source.bubble_slot, 1);
    assert_eq!(out.bubbles[1].identity, hero);
    assert_eq!(out.count(AttributionMethod::Unattributed), 1);
    assert_eq!(out.for_panel(Ordinal(0)).count(), 2);
}

#[test]
fn confident_speaker_carries_into_the_next_panel_on_the_same_page() {
    let mut chapter = fixture();
    // Without the left bubble the tail-matched line directly precedes the next panel.
    chapter.pages[0].panels[0].bubbles.remove(0);
    let layout = LayoutConfig::default();
    let order = ReadingOrderResolver::new(&layout).resolve_chapter(&chapter);
    let mut store = IdentityStore::new();
    let (ids, _) =
        track_chapter(&IdentityConfig::default(), &mut store, &chapter, &order).unwrap();
    let scenes = resolve_scenes(&chapter, &order, "unknown");

    let out = attribute_chapter(
        &layout,
        &SpeakerConfig::default(),
        &chapter,
        &order,
        &scenes,
        &ids,
    );
    assert_eq!(out.bubbles[1].bubble_id, "offscreen");
    assert_eq!(out.bubbles[1].method, AttributionMethod::CarriedOver);
    assert_eq!(out.bubbles[1].identity, ids.get("hero"));
}

fn spread_chapter(spread: bool) -> ChapterInput {
    let hero = CharacterInput {
        id: "hero".to_string(),
        bbox: Rect::new(0.4, 0.4, 0.6, 0.6),
        embedding: vec![1.0, 0.0],
    };
    let half = |id: &str, bbox: Rect, characters: Vec<CharacterInput>, bubble: BubbleInput| {
        PanelInput {
            id: id.to_string(),
            bbox,
            polygon: None,
            objects: Vec::new(),
            characters,
            bubbles: vec![bubble],
            sound_cues: Vec::new(),
            tags: None,
        }
    };
    ChapterInput {
        title: "t".to_string(),
        chapter: 1,
        language: "en".to_string(),
        pages: vec![
            PageInput {
                index: PageIndex(0),
                four_koma: Some(false),
                spread_with_next: Some(spread),
                panels: vec![half(
                    "spread-right",
                    Rect::new(0.0, 0.0, 0.95, 1.0),
                    vec![hero],
                    bubble("shout", 0.45, 0.1, Some(Vec2::new(0.0, 1.0))),
                )],
            },
            PageInput {
                index: PageIndex(1),
                four_koma: Some(false),
                spread_with_next: None,
                panels: vec![half(
                    "spread-left",
                    Rect::new(0.05, 0.0, 1.0, 1.0),
                    Vec::new(),
                    bubble("echo", 0.4, 0.1, None),
                )],
            },
        ],
    }
}

fn attribute_fixture(chapter: &ChapterInput) -> (ChapterAttributions, IdentityAssignments) {
    let layout = LayoutConfig::default();
    let order = ReadingOrderResolver::new(&layout).resolve_chapter(chapter);
    let mut store = IdentityStore::new();
    let (ids, _) =
        track_chapter(&IdentityConfig::default(), &mut store, chapter, &order).unwrap();
    let scenes = resolve_scenes(chapter, &order, "unknown");
    let out = attribute_chapter(
        &layout,
        &SpeakerConfig::default(),
        chapter,
        &order,
        &scenes,
        &ids,
    );
    (out, ids)
}

#[test]
fn speaker_carries_across_the_halves_of_a_spread() {
    let chapter = spread_chapter(true);
    let (out, ids) = attribute_fixture(&chapter);

    assert_eq!(out.bubbles[0].bubble_id, "shout");
    assert_eq!(out.bubbles[0].method, AttributionMethod::TailMatched);
    assert_eq!(out.bubbles[1].bubble_id, "echo");
    assert_eq!(out.bubbles[1].method, AttributionMethod::CarriedOver);
    assert_eq!(out.bubbles[1].identity, ids.get("hero"));
}

#[test]
fn speaker_does_not_carry_onto_the_next_separate_page() {
    let chapter = spread_chapter(false);
    let (out, _) = attribute_fixture(&chapter);

    assert_eq!(out.bubbles[0].method, AttributionMethod::TailMatched);
    assert_eq!(out.bubbles[1].method, AttributionMethod::Unattributed);
}

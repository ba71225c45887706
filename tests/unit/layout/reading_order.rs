use super::*;
use crate::model::chapter::PanelInput;

fn panel(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> PanelInput {
    PanelInput {
        id: id.to_string(),
        bbox: Rect::new(x0, y0, x1, y1),
        polygon: None,
        objects: Vec::new(),
        characters: Vec::new(),
        bubbles: Vec::new(),
        sound_cues: Vec::new(),
        tags: None,
    }
}

fn page(index: u32, panels: Vec<PanelInput>) -> PageInput {
    PageInput {
        index: PageIndex(index),
        four_koma: None,
        spread_with_next: None,
        panels,
    }
}

fn chapter(pages: Vec<PageInput>) -> ChapterInput {
    ChapterInput {
        title: "t".to_string(),
        chapter: 1,
        language: "ja".to_string(),
        pages,
    }
}

fn ids(page: &PageInput, order: &[usize]) -> Vec<String> {
    order.iter().map(|&i| page.panels[i].id.clone()).collect()
}

fn top_and_two_bottom() -> Vec<PanelInput> {
    vec![
        panel("top", 0.05, 0.05, 0.95, 0.45),
        panel("bottom-left", 0.05, 0.5, 0.48, 0.95),
        panel("bottom-right", 0.52, 0.5, 0.95, 0.95),
    ]
}

#[test]
fn top_then_bottom_right_then_bottom_left() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    let p = page(0, top_and_two_bottom());
    assert_eq!(
        ids(&p, &r.resolve_page(&p)),
        vec!["top", "bottom-right", "bottom-left"]
    );
}

#[test]
fn order_does_not_depend_on_insertion_order() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    let base = top_and_two_bottom();
    let permutations = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for perm in permutations {
        let p = page(0, perm.iter().map(|&i| base[i].clone()).collect());
        assert_eq!(
            ids(&p, &r.resolve_page(&p)),
            vec!["top", "bottom-right", "bottom-left"],
            "permutation {perm:?}"
        );
    }
}

#[test]
fn columns_read_right_to_left() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    let p = page(
        0,
        vec![
            panel("left", 0.0, 0.0, 0.45, 1.0),
            panel("right-top", 0.55, 0.0, 1.0, 0.3),
            panel("right-bottom", 0.55, 0.35, 1.0, 1.0),
        ],
    );
    assert_eq!(
        ids(&p, &r.resolve_page(&p)),
        vec!["right-top", "right-bottom", "left"]
    );
}

#[test]
fn interlocking_panels_fall_back_to_corner_order() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    // Pinwheel: no full-span gutter in either direction.
    let p = page(
        0,
        vec![
            panel("a", 0.0, 0.0, 0.6, 0.4),
            panel("b", 0.6, 0.0, 1.0, 0.6),
            panel("c", 0.4, 0.6, 1.0, 1.0),
            panel("d", 0.0, 0.4, 0.4, 1.0),
            panel("inner", 0.4, 0.4, 0.6, 0.6),
        ],
    );
    assert_eq!(
        ids(&p, &r.resolve_page(&p)),
        vec!["b", "c", "a", "inner", "d"]
    );
}

#[test]
fn nested_panel_with_shared_corner_reads_first() {
    let cfg = LayoutConfig::default();
    let idx = GeometryIndex::new(vec![
        Rect::new(0.0, 0.0, 1.0, 1.0),
        Rect::new(0.7, 0.0, 1.0, 0.3),
    ]);
    let order = corner_order(&idx, &["outer", "inset"], vec![0, 1], &cfg);
    assert_eq!(order, vec![1, 0]);
}

#[test]
fn embedded_inset_reads_before_its_encloser() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    let p = page(
        0,
        vec![
            panel("outer", 0.0, 0.0, 0.7, 1.0),
            panel("inset", 0.05, 0.7, 0.3, 0.95),
            panel("side", 0.75, 0.0, 1.0, 1.0),
        ],
    );
    assert_eq!(
        ids(&p, &r.resolve_page(&p)),
        vec!["side", "inset", "outer"]
    );
}

#[test]
fn nested_insets_unwind_innermost_first() {
    let cfg = LayoutConfig::default();
    let idx = GeometryIndex::new(vec![
        Rect::new(0.0, 0.0, 1.0, 1.0),
        Rect::new(0.1, 0.5, 0.5, 0.9),
        Rect::new(0.2, 0.6, 0.3, 0.7),
        Rect::new(0.6, 0.1, 0.9, 0.3),
    ]);
    let order = corner_order(&idx, &["page", "mid", "core", "corner"], vec![0, 1, 2, 3], &cfg);
    assert_eq!(order, vec![3, 2, 1, 0]);
}

#[test]
fn inset_nesting_can_be_switched_off() {
    let mut cfg = LayoutConfig::default();
    cfg.nest_overlap = 1.0;
    let idx = GeometryIndex::new(vec![
        Rect::new(0.0, 0.0, 0.7, 1.0),
        // Slightly protrudes from the left edge of its host.
        Rect::new(-0.02, 0.7, 0.3, 0.95),
    ]);
    assert_eq!(corner_order(&idx, &["host", "inset"], vec![0, 1], &cfg), vec![0, 1]);
    cfg.nest_overlap = 0.9;
    assert_eq!(corner_order(&idx, &["host", "inset"], vec![0, 1], &cfg), vec![1, 0]);
}

#[test]
fn four_koma_flag_forces_top_to_bottom() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    let mut p = page(
        0,
        vec![
            panel("k3", 0.05, 0.52, 0.95, 0.72),
            panel("k1", 0.05, 0.02, 0.95, 0.22),
            panel("k4", 0.05, 0.77, 0.95, 0.97),
            panel("k2", 0.05, 0.27, 0.95, 0.47),
        ],
    );
    assert!(detect_four_koma(
        &p.panels.iter().map(|x| x.bounds()).collect::<Vec<_>>(),
        UNIT_PAGE,
        &cfg
    ));
    assert_eq!(ids(&p, &r.resolve_page(&p)), vec!["k1", "k2", "k3", "k4"]);

    p.four_koma = Some(true);
    assert_eq!(ids(&p, &r.resolve_page(&p)), vec!["k1", "k2", "k3", "k4"]);
}

#[test]
fn narrow_strips_are_not_four_koma() {
    let cfg = LayoutConfig::default();
    let rects = vec![
        Rect::new(0.6, 0.0, 1.0, 0.2),
        Rect::new(0.6, 0.25, 1.0, 0.45),
        Rect::new(0.6, 0.5, 1.0, 0.7),
        Rect::new(0.6, 0.75, 1.0, 0.95),
    ];
    assert!(!detect_four_koma(&rects, UNIT_PAGE, &cfg));
}

#[test]
fn empty_page_gets_synthetic_panel_and_ordinals_stay_contiguous() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    let ch = chapter(vec![
        page(0, top_and_two_bottom()),
        page(1, Vec::new()),
        page(2, vec![panel("solo", 0.1, 0.1, 0.9, 0.9)]),
    ]);
    let order = r.resolve_chapter(&ch);
    assert_eq!(order.len(), 5);
    for (i, p) in order.panels.iter().enumerate() {
        assert_eq!(p.ordinal, Ordinal(i as u32));
    }
    let synthetic = &order.panels[3];
    assert!(synthetic.synthetic);
    assert_eq!(synthetic.page, PageIndex(1));
    assert_eq!(synthetic.bounds, UNIT_PAGE);
    assert_eq!(order.recovered_pages, vec![PageIndex(1)]);
}

#[test]
fn degenerate_geometry_absorbs_all_page_detections() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    let ch = chapter(vec![page(
        0,
        vec![
            panel("ok", 0.1, 0.1, 0.9, 0.4),
            panel("flat", 0.1, 0.5, 0.9, 0.5),
        ],
    )]);
    let order = r.resolve_chapter(&ch);
    assert_eq!(order.len(), 1);
    assert!(order.panels[0].synthetic);
    assert_eq!(order.panels[0].sources, vec![0, 1]);
}

#[test]
fn pages_are_ordered_by_index_not_input_position() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    let ch = chapter(vec![
        page(1, vec![panel("second", 0.1, 0.1, 0.9, 0.9)]),
        page(0, vec![panel("first", 0.1, 0.1, 0.9, 0.9)]),
    ]);
    let order = r.resolve_chapter(&ch);
    let got: Vec<&str> = order.panels.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(got, vec!["first", "second"]);
    assert_eq!(order.panels[0].page_slot, 1);
}

#[test]
fn spread_merges_pages_across_binding() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::new(&cfg);
    let mut right = page(
        0,
        vec![
            // Wide establishing shot bleeding into the binding.
            panel("r-top", 0.0, 0.0, 0.95, 0.4),
            panel("r-bottom", 0.05, 0.45, 0.95, 0.95),
        ],
    );
    right.spread_with_next = Some(true);
    let left = page(
        1,
        vec![
            panel("l-top", 0.05, 0.0, 1.0, 0.4),
            panel("l-bottom", 0.05, 0.45, 0.95, 0.95),
        ],
    );
    let order = r.resolve_chapter(&chapter(vec![right, left]));
    let got: Vec<&str> = order.panels.iter().map(|p| p.id.as_str()).collect();
    // The merged top row reads right to left across both pages before the bottom row.
    assert_eq!(got, vec!["r-top", "l-top", "r-bottom", "l-bottom"]);
    assert_eq!(order.spreads, vec![(PageIndex(0), PageIndex(1))]);
    assert_eq!(order.panels[1].page, PageIndex(1));
    assert_eq!(order.reading_page(PageIndex(1)), PageIndex(0));
    assert_eq!(order.reading_page(PageIndex(0)), PageIndex(0));
}

struct Never;

impl SpreadContinuity for Never {
    fn continues(&self, _page: &PageInput, _next: &PageInput) -> bool {
        false
    }
}

#[test]
fn continuity_predicate_is_pluggable() {
    let cfg = LayoutConfig::default();
    let r = ReadingOrderResolver::with_continuity(&cfg, &Never);
    let mut right = page(0, vec![panel("r", 0.0, 0.0, 0.95, 0.4)]);
    right.spread_with_next = Some(true);
    let left = page(1, vec![panel("l", 0.05, 0.0, 1.0, 0.4)]);
    let order = r.resolve_chapter(&chapter(vec![right, left]));
    assert!(order.spreads.is_empty());
    assert_eq!(order.reading_page(PageIndex(1)), PageIndex(1));
}

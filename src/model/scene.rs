use crate::layout::reading_order::ReadingOrder;
use crate::model::chapter::{ChapterInput, PanelTags};

/// Effective semantic tags of one ordered panel.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelScene {
    pub scene: String,
    pub emotion: String,
    pub intensity: f64,
    /// First panel of the chapter or scene label differs from the previous panel's.
    pub boundary: bool,
    /// Number of scene boundaries before this panel. Equal epochs mean no scene change between.
    pub epoch: u32,
}

/// Resolve tags for every panel in reading order.
///
/// Untagged panels inherit the previous panel's tags, or `fallback_scene` with neutral emotion at
/// the start of the chapter. A synthetic panel uses the first tagged source panel.
pub fn resolve_scenes(
    chapter: &ChapterInput,
    order: &ReadingOrder,
    fallback_scene: &str,
) -> Vec<PanelScene> {
    let mut out: Vec<PanelScene> = Vec::with_capacity(order.len());
    let mut epoch = 0u32;
    for panel in &order.panels {
        let page = &chapter.pages[panel.page_slot];
        let tags: Option<&PanelTags> = panel
            .sources
            .iter()
            .find_map(|&s| page.panels[s].tags.as_ref());

        let (scene, emotion, intensity) = match (tags, out.last()) {
            (Some(t), _) => (t.scene.clone(), t.emotion.clone(), t.intensity),
            (None, Some(prev)) => (prev.scene.clone(), prev.emotion.clone(), prev.intensity),
            (None, None) => (fallback_scene.to_string(), "neutral".to_string(), 0.5),
        };

        let boundary = match out.last() {
            Some(prev) => prev.scene != scene,
            None => true,
        };
        if boundary && !out.is_empty() {
            epoch += 1;
        }
        out.push(PanelScene {
            scene,
            emotion,
            intensity,
            boundary,
            epoch,
        });
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/model/scene.rs"]
mod tests;

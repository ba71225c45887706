use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::core::{PageIndex, Point, Rect, Vec2, rect_is_finite};
use crate::foundation::error::{PanelwaveError, PanelwaveResult};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// Everything the perception and tagging services produced for one chapter.
///
/// Coordinates are page-relative and normalized to `[0, 1]`.
pub struct ChapterInput {
    /// Title the chapter belongs to. Keys cross-chapter identity persistence.
    pub title: String,
    /// Chapter number within the title.
    pub chapter: u32,
    /// BCP-47-ish language code of the lettering (`ja`, `en`, ...).
    #[serde(default = "default_language")]
    pub language: String,
    /// Pages in physical order.
    pub pages: Vec<PageInput>,
}

fn default_language() -> String {
    "ja".to_string()
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// One page as reported by the vision service.
pub struct PageInput {
    /// Page position within the chapter.
    pub index: PageIndex,
    /// Force (or forbid) the 4-koma strategy. `None` auto-detects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub four_koma: Option<bool>,
    /// Vision-service continuity signal: artwork runs across the binding into the next page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_with_next: Option<bool>,
    /// Detected panels in arbitrary order.
    #[serde(default)]
    pub panels: Vec<PanelInput>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// One detected panel with everything found inside it.
pub struct PanelInput {
    /// Panel identifier (unique within the chapter).
    pub id: String,
    /// Axis-aligned bounds.
    pub bbox: Rect,
    /// Optional outline for irregular panels. When present its bounding box wins over `bbox`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<Point>>,
    /// Non-character object boxes.
    #[serde(default)]
    pub objects: Vec<Rect>,
    /// Character detections.
    #[serde(default)]
    pub characters: Vec<CharacterInput>,
    /// Speech bubbles.
    #[serde(default)]
    pub bubbles: Vec<BubbleInput>,
    /// Onomatopoeia and other sound cues.
    #[serde(default)]
    pub sound_cues: Vec<SoundCueInput>,
    /// Scene and emotion tags from the semantic tagging service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<PanelTags>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// A character region plus its re-identification embedding.
pub struct CharacterInput {
    /// Detection identifier (unique within the chapter).
    pub id: String,
    /// Region bounds.
    pub bbox: Rect,
    /// Fixed-length appearance embedding.
    pub embedding: Vec<f32>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// A speech bubble with its OCR text.
pub struct BubbleInput {
    /// Bubble identifier (unique within the chapter).
    pub id: String,
    /// Region bounds.
    pub bbox: Rect,
    /// Raw OCR text.
    #[serde(default)]
    pub text: String,
    /// Direction of the bubble's tail, pointing toward the presumed speaker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail: Option<Vec2>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
/// Onomatopoeia class.
pub enum SoundCueKind {
    /// Depicts an actual sound.
    #[default]
    Giongo,
    /// Depicts a state or feeling.
    Gitaigo,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// A detected sound cue.
pub struct SoundCueInput {
    /// Lettering as read.
    pub text: String,
    /// Sound or state.
    #[serde(default)]
    pub kind: SoundCueKind,
    /// Audio keywords for the effect.
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Per-panel semantic tags.
pub struct PanelTags {
    /// Scene label. A change of label marks a scene boundary.
    pub scene: String,
    /// Aggregated emotion label.
    #[serde(default = "default_emotion")]
    pub emotion: String,
    /// Emotional intensity in `[0, 1]`.
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

fn default_emotion() -> String {
    "neutral".to_string()
}

fn default_intensity() -> f64 {
    0.5
}

impl PanelInput {
    /// Effective bounds: the polygon's bounding box when a polygon is present.
    pub fn bounds(&self) -> Rect {
        match &self.polygon {
            Some(points) if !points.is_empty() => {
                let mut r = Rect::from_points(points[0], points[0]);
                for p in &points[1..] {
                    r = r.union_pt(*p);
                }
                r
            }
            _ => self.bbox.abs(),
        }
    }
}

impl ChapterInput {
    /// Parse a chapter from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> PanelwaveResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| PanelwaveError::validation(format!("parse chapter JSON: {e}")))
    }

    /// Parse a chapter from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> PanelwaveResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PanelwaveError::validation(format!("open chapter JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Embedding length shared by every character detection, if any exist.
    pub fn embedding_dim(&self) -> Option<usize> {
        self.pages
            .iter()
            .flat_map(|p| &p.panels)
            .flat_map(|p| &p.characters)
            .map(|c| c.embedding.len())
            .next()
    }

    /// Validate identifiers and numeric payloads.
    ///
    /// Panel geometry is deliberately *not* rejected here: degenerate panel boxes are recovered by
    /// the reading-order resolver. Detection boxes and embeddings must be well formed.
    pub fn validate(&self) -> PanelwaveResult<()> {
        if self.title.trim().is_empty() {
            return Err(PanelwaveError::validation("chapter title must be non-empty"));
        }

        let mut page_indices = BTreeSet::new();
        let mut ids = BTreeSet::new();
        let dim = self.embedding_dim();

        for page in &self.pages {
            if !page_indices.insert(page.index) {
                return Err(PanelwaveError::validation(format!(
                    "duplicate page index {}",
                    page.index.0
                )));
            }
            for panel in &page.panels {
                unique_id(&mut ids, &panel.id, "panel")?;
                for obj in &panel.objects {
                    finite_rect(*obj, &format!("panel '{}' object", panel.id))?;
                }
                for c in &panel.characters {
                    unique_id(&mut ids, &c.id, "character")?;
                    finite_rect(c.bbox, &format!("character '{}'", c.id))?;
                    if c.embedding.is_empty() {
                        return Err(PanelwaveError::validation(format!(
                            "character '{}' has an empty embedding",
                            c.id
                        )));
                    }
                    if Some(c.embedding.len()) != dim {
                        return Err(PanelwaveError::validation(format!(
                            "character '{}' embedding has length {}, expected {}",
                            c.id,
                            c.embedding.len(),
                            dim.unwrap_or(0)
                        )));
                    }
                    if c.embedding.iter().any(|v| !v.is_finite()) {
                        return Err(PanelwaveError::validation(format!(
                            "character '{}' embedding contains non-finite values",
                            c.id
                        )));
                    }
                }
                for b in &panel.bubbles {
                    unique_id(&mut ids, &b.id, "bubble")?;
                    finite_rect(b.bbox, &format!("bubble '{}'", b.id))?;
                    if let Some(t) = b.tail
                        && (!t.x.is_finite() || !t.y.is_finite())
                    {
                        return Err(PanelwaveError::validation(format!(
                            "bubble '{}' tail must be finite",
                            b.id
                        )));
                    }
                }
                if let Some(tags) = &panel.tags {
                    if tags.scene.trim().is_empty() {
                        return Err(PanelwaveError::validation(format!(
                            "panel '{}' scene tag must be non-empty",
                            panel.id
                        )));
                    }
                    if !tags.intensity.is_finite() || !(0.0..=1.0).contains(&tags.intensity) {
                        return Err(PanelwaveError::validation(format!(
                            "panel '{}' intensity must be in [0, 1]",
                            panel.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn unique_id(ids: &mut BTreeSet<String>, id: &str, kind: &str) -> PanelwaveResult<()> {
    if id.trim().is_empty() {
        return Err(PanelwaveError::validation(format!("{kind} id must be non-empty")));
    }
    if !ids.insert(id.to_string()) {
        return Err(PanelwaveError::validation(format!(
            "duplicate id '{id}' ({kind})"
        )));
    }
    Ok(())
}

fn finite_rect(r: Rect, what: &str) -> PanelwaveResult<()> {
    if !rect_is_finite(r) {
        return Err(PanelwaveError::validation(format!(
            "{what} bounds must be finite"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/model/chapter.rs"]
mod tests;

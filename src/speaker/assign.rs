use crate::config::SpeakerConfig;
use crate::foundation::core::{ClusterId, PageIndex, Point, Vec2};

/// How an attribution was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    TailMatched,
    Geometric,
    CarriedOver,
    Unattributed,
}

/// Outcome of the cascade for one bubble. Each variant carries the measurement its confidence is
/// derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Attribution {
    /// The tail ray points at `identity`, off-axis by `angle_deg`.
    TailMatched { identity: ClusterId, angle_deg: f64 },
    /// `identity` is the nearest in-panel character, `distance` away.
    Geometric { identity: ClusterId, distance: f64 },
    /// The previous bubble's speaker continues.
    CarriedOver { identity: ClusterId },
    Unattributed,
}

impl Attribution {
    pub fn identity(&self) -> Option<ClusterId> {
        match *self {
            Self::TailMatched { identity, .. }
            | Self::Geometric { identity, .. }
            | Self::CarriedOver { identity } => Some(identity),
            Self::Unattributed => None,
        }
    }

    pub fn method(&self) -> AttributionMethod {
        match self {
            Self::TailMatched { .. } => AttributionMethod::TailMatched,
            Self::Geometric { .. } => AttributionMethod::Geometric,
            Self::CarriedOver { .. } => AttributionMethod::CarriedOver,
            Self::Unattributed => AttributionMethod::Unattributed,
        }
    }

    /// Confidence in `[0, 1]`.
    pub fn confidence(&self, cfg: &SpeakerConfig) -> f64 {
        let c = match *self {
            Self::TailMatched { angle_deg, .. } => {
                let t = (angle_deg / cfg.tail_angle_tolerance_deg).clamp(0.0, 1.0);
                lerp(cfg.tail_confidence_max, cfg.tail_confidence_min, t)
            }
            Self::Geometric { distance, .. } => {
                let t = (distance / cfg.nearest_max_distance).clamp(0.0, 1.0);
                lerp(cfg.nearest_confidence_max, cfg.nearest_confidence_min, t)
            }
            Self::CarriedOver { .. } => cfg.carry_over_confidence,
            Self::Unattributed => 0.0,
        };
        c.clamp(0.0, 1.0)
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// A character visible in the bubble's panel, with its resolved identity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub identity: ClusterId,
    pub center: Point,
}

/// The bubble being attributed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BubbleCue {
    pub center: Point,
    pub tail: Option<Vec2>,
    /// Page the bubble is read on. Spread halves share the first-read page.
    pub page: PageIndex,
    /// Scene epoch of the owning panel.
    pub scene_epoch: u32,
}

/// The previous bubble in reading order and how it was attributed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviousBubble {
    pub page: PageIndex,
    pub scene_epoch: u32,
    pub identity: Option<ClusterId>,
    pub confidence: f64,
}

/// Run the attribution cascade: tail ray, nearest character, carry-over, unattributed.
///
/// Pure: identical inputs always produce the identical attribution.
pub fn attribute(
    cfg: &SpeakerConfig,
    bubble: &BubbleCue,
    candidates: &[Candidate],
    previous: Option<&PreviousBubble>,
) -> Attribution {
    if let Some(a) = tail_rule(cfg, bubble, candidates) {
        return a;
    }
    if let Some(a) = nearest_rule(cfg, bubble, candidates) {
        return a;
    }
    if let Some(a) = carry_over_rule(cfg, bubble, previous) {
        return a;
    }
    Attribution::Unattributed
}

fn tail_rule(cfg: &SpeakerConfig, bubble: &BubbleCue, candidates: &[Candidate]) -> Option<Attribution> {
    let tail = bubble.tail?;
    let len = tail.hypot();
    if len.is_nan() || len <= f64::EPSILON {
        return None;
    }
    let dir = tail / len;

    // (perpendicular distance, along-ray distance, index, angle)
    let mut best: Option<(f64, f64, usize, f64)> = None;
    for (i, c) in candidates.iter().enumerate() {
        let v = c.center - bubble.center;
        let along = v.dot(dir);
        if along <= 0.0 {
            continue;
        }
        let perp = v.cross(dir).abs();
        let angle_deg = perp.atan2(along).to_degrees();
        if angle_deg > cfg.tail_angle_tolerance_deg {
            continue;
        }
        let better = match best {
            None => true,
            Some((bp, ba, _, _)) => perp < bp || (perp == bp && along < ba),
        };
        if better {
            best = Some((perp, along, i, angle_deg));
        }
    }

    best.map(|(_, _, i, angle_deg)| Attribution::TailMatched {
        identity: candidates[i].identity,
        angle_deg,
    })
}

fn nearest_rule(
    cfg: &SpeakerConfig,
    bubble: &BubbleCue,
    candidates: &[Candidate],
) -> Option<Attribution> {
    let mut best: Option<(f64, usize)> = None;
    for (i, c) in candidates.iter().enumerate() {
        let d = (c.center - bubble.center).hypot();
        if !d.is_finite() || d >= cfg.nearest_max_distance {
            continue;
        }
        if best.is_none_or(|(bd, _)| d < bd) {
            best = Some((d, i));
        }
    }
    best.map(|(distance, i)| Attribution::Geometric {
        identity: candidates[i].identity,
        distance,
    })
}

fn carry_over_rule(
    cfg: &SpeakerConfig,
    bubble: &BubbleCue,
    previous: Option<&PreviousBubble>,
) -> Option<Attribution> {
    let prev = previous?;
    if prev.page != bubble.page || prev.scene_epoch != bubble.scene_epoch {
        return None;
    }
    if prev.confidence < cfg.medium_confidence {
        return None;
    }
    prev.identity
        .map(|identity| Attribution::CarriedOver { identity })
}

#[cfg(test)]
#[path = "../../tests/unit/speaker/assign.rs"]
mod tests;

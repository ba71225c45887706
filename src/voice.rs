//! Voice profiles for speech synthesis requests.
//!
//! Every identity cluster of a title maps to one stable voice. Profiles are derived from the title
//! and cluster id alone, so a character keeps its voice across chapters as long as its cluster id
//! survives through the identity snapshot.

use xxhash_rust::xxh3::xxh3_64;

use crate::foundation::core::ClusterId;

const FIRST_SEED: u64 = 1000;

/// Per-speaker synthesis parameters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VoiceProfile {
    pub voice_id: String,
    pub seed: u64,
    /// Pitch shift in `[-1, 1]`.
    pub pitch: f64,
    /// Speed multiplier.
    pub speed: f64,
}

/// Voice parameters of one utterance after emotion adjustment.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Prosody {
    pub emotion: String,
    pub pitch: f64,
    pub speed: f64,
}

/// Deterministic voice assignment for one title.
#[derive(Clone, Debug)]
pub struct VoiceRegistry {
    title: String,
}

impl VoiceRegistry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Voice used for bubbles without a speaker.
    pub fn narrator(&self) -> VoiceProfile {
        VoiceProfile {
            voice_id: "narrator".to_string(),
            seed: FIRST_SEED - 1,
            pitch: 0.0,
            speed: 1.0,
        }
    }

    pub fn profile(&self, identity: Option<ClusterId>) -> VoiceProfile {
        let Some(id) = identity else {
            return self.narrator();
        };
        let h = xxh3_64(format!("{}\u{1f}{}", self.title, id.0).as_bytes());
        // Two independent 16-bit lanes of the hash spread pitch and speed.
        let pitch_unit = ((h & 0xffff) as f64) / 65535.0;
        let speed_unit = (((h >> 16) & 0xffff) as f64) / 65535.0;
        VoiceProfile {
            voice_id: format!("character-{}", id.0),
            seed: FIRST_SEED + u64::from(id.0),
            pitch: round3(-0.3 + 0.6 * pitch_unit),
            speed: round3(0.9 + 0.2 * speed_unit),
        }
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Speed multiplier and pitch offset for an emotion label. Unknown labels are neutral.
pub fn emotion_adjustment(emotion: &str) -> (f64, f64) {
    match emotion.trim().to_ascii_lowercase().as_str() {
        "anger" | "angry" => (1.2, 0.1),
        "joy" | "happy" => (1.1, 0.2),
        "sadness" | "sad" => (0.8, -0.2),
        "fear" => (1.15, 0.15),
        "excitement" | "excited" => (1.2, 0.15),
        "nervous" => (1.1, 0.1),
        "calm" => (0.9, -0.1),
        _ => (1.0, 0.0),
    }
}

/// Apply the panel's emotion to a base voice.
pub fn prosody_for(voice: &VoiceProfile, emotion: &str) -> Prosody {
    let (speed_mul, pitch_add) = emotion_adjustment(emotion);
    Prosody {
        emotion: emotion.to_string(),
        pitch: (voice.pitch + pitch_add).clamp(-1.0, 1.0),
        speed: voice.speed * speed_mul,
    }
}

#[cfg(test)]
#[path = "../tests/unit/voice.rs"]
mod tests;

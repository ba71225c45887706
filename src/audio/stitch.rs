/// Result of extending a fragment to a target length.
#[derive(Clone, Debug, PartialEq)]
pub struct Stitched {
    /// Interleaved samples, exactly `target_frames * channels` long.
    pub samples: Vec<f32>,
    /// Number of internal self-crossfades.
    pub joins: usize,
}

/// Loop-stitch interleaved `src` until it fills `target_frames`, then truncate.
///
/// Each repetition starts `crossfade_frames` before the previous one ends and fades linearly
/// from the old tail into the new head. The crossfade is clamped to half the fragment so every
/// repetition contributes new material.
pub fn loop_stitch(
    src: &[f32],
    channels: u16,
    target_frames: usize,
    crossfade_frames: usize,
) -> Stitched {
    let ch = usize::from(channels.max(1));
    let src_frames = src.len() / ch;
    let mut out = vec![0.0f32; target_frames * ch];
    if src_frames == 0 || target_frames == 0 {
        return Stitched {
            samples: out,
            joins: 0,
        };
    }

    let xfade = crossfade_frames.min(src_frames / 2);
    let stride = src_frames - xfade;

    let first = src_frames.min(target_frames);
    out[..first * ch].copy_from_slice(&src[..first * ch]);

    let mut joins = 0;
    let mut start = stride;
    // The previous repetition ends at `start + xfade`.
    while start + xfade < target_frames {
        joins += 1;
        for i in 0..src_frames {
            let dst = start + i;
            if dst >= target_frames {
                break;
            }
            for c in 0..ch {
                let s = src[i * ch + c];
                let d = &mut out[dst * ch + c];
                if i < xfade {
                    let t = (i + 1) as f32 / (xfade + 1) as f32;
                    *d = *d * (1.0 - t) + s * t;
                } else {
                    *d = s;
                }
            }
        }
        start += stride;
    }

    Stitched {
        samples: out,
        joins,
    }
}

/// Multiply the first `fade_in` and last `fade_out` frames by linear ramps.
pub fn apply_edge_fades(samples: &mut [f32], channels: u16, fade_in: usize, fade_out: usize) {
    let ch = usize::from(channels.max(1));
    let frames = samples.len() / ch;
    let fade_in = fade_in.min(frames);
    let fade_out = fade_out.min(frames);
    for f in 0..fade_in {
        let g = (f as f32 + 0.5) / fade_in as f32;
        for c in 0..ch {
            samples[f * ch + c] *= g;
        }
    }
    for k in 0..fade_out {
        let f = frames - 1 - k;
        let g = (k as f32 + 0.5) / fade_out as f32;
        for c in 0..ch {
            samples[f * ch + c] *= g;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/stitch.rs"]
mod tests;

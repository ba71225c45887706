use std::sync::Arc;

/// One synthesized waveform: interleaved `f32` PCM at its native rate and channel count.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Arc<Vec<f32>>,
}

impl Fragment {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Arc::new(samples),
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Describe why this fragment is unusable, if it is.
    pub fn check(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("fragment sample rate is zero".to_string());
        }
        if self.channels == 0 {
            return Err("fragment has zero channels".to_string());
        }
        if self.samples.len() % usize::from(self.channels) != 0 {
            return Err(format!(
                "fragment has {} samples, not a multiple of {} channels",
                self.samples.len(),
                self.channels
            ));
        }
        if self.frames() == 0 {
            return Err("fragment is empty".to_string());
        }
        if self.samples.iter().any(|s| !s.is_finite()) {
            return Err("fragment contains non-finite samples".to_string());
        }
        Ok(())
    }

    /// Convert to interleaved PCM at `sample_rate` with `channels` (1 or 2).
    ///
    /// Resampling interpolates linearly between neighboring source frames. Mono sources are
    /// duplicated to both output channels; multichannel sources fold their first two channels.
    pub fn conform(&self, sample_rate: u32, channels: u16) -> Vec<f32> {
        let src_frames = self.frames();
        if src_frames == 0 || sample_rate == 0 || channels == 0 {
            return Vec::new();
        }
        let src = self.samples.as_slice();
        let src_ch = usize::from(self.channels);
        let dst_ch = usize::from(channels);

        let frame_lr = |f: usize| -> (f32, f32) {
            let i = f * src_ch;
            if src_ch == 1 {
                (src[i], src[i])
            } else {
                (src[i], src[i + 1])
            }
        };

        let dst_frames = if self.sample_rate == sample_rate {
            src_frames
        } else {
            ((src_frames as f64) * f64::from(sample_rate) / f64::from(self.sample_rate)).round()
                as usize
        };
        let step = f64::from(self.sample_rate) / f64::from(sample_rate);

        let mut out = Vec::with_capacity(dst_frames * dst_ch);
        for f in 0..dst_frames {
            let pos = f as f64 * step;
            let f0 = (pos.floor() as usize).min(src_frames - 1);
            let f1 = (f0 + 1).min(src_frames - 1);
            let frac = (pos - f0 as f64).clamp(0.0, 1.0) as f32;
            let (l0, r0) = frame_lr(f0);
            let (l1, r1) = frame_lr(f1);
            let l = l0 + (l1 - l0) * frac;
            let r = r0 + (r1 - r0) * frac;
            if dst_ch == 1 {
                out.push(if src_ch == 1 { l } else { f32::midpoint(l, r) });
            } else {
                out.push(l);
                out.push(r);
                for _ in 2..dst_ch {
                    out.push(0.0);
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/fragment.rs"]
mod tests;

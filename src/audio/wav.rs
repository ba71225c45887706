use std::path::Path;

use crate::audio::fragment::Fragment;
use crate::foundation::error::{PanelwaveError, PanelwaveResult};

/// Decode a WAV file into a [`Fragment`]. Integer PCM is scaled to `[-1, 1]`.
pub fn read_wav(path: &Path) -> PanelwaveResult<Fragment> {
    let mut reader = hound::WavReader::open(path).map_err(|e| {
        PanelwaveError::synthesis(format!("open WAV '{}': {e}", path.display()))
    })?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| {
                PanelwaveError::synthesis(format!("decode WAV '{}': {e}", path.display()))
            })?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(|e| {
                    PanelwaveError::synthesis(format!("decode WAV '{}': {e}", path.display()))
                })?
        }
    };
    Ok(Fragment::new(spec.sample_rate, spec.channels, samples))
}

/// Write interleaved samples as a 32-bit float WAV file.
pub fn write_wav(
    path: &Path,
    sample_rate: u32,
    channels: u16,
    samples: &[f32],
) -> PanelwaveResult<()> {
    ensure_parent(path)?;
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let write_err = |e: hound::Error| {
        PanelwaveError::Other(anyhow::Error::new(e).context(format!("write WAV '{}'", path.display())))
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(write_err)?;
    for &s in samples {
        writer.write_sample(s).map_err(write_err)?;
    }
    writer.finalize().map_err(write_err)
}

/// Write interleaved `f32` PCM samples as raw little-endian `.f32le`.
pub fn write_f32le(path: &Path, samples: &[f32]) -> PanelwaveResult<()> {
    ensure_parent(path)?;
    let mut bytes = Vec::<u8>::with_capacity(samples.len() * 4);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(path, bytes).map_err(|e| {
        PanelwaveError::Other(
            anyhow::Error::new(e)
                .context(format!("failed to write mixed audio file '{}'", path.display())),
        )
    })
}

fn ensure_parent(path: &Path) -> PanelwaveResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            PanelwaveError::Other(anyhow::Error::new(e).context(format!(
                "failed to create output directory '{}'",
                parent.display()
            )))
        })?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/audio/wav.rs"]
mod tests;

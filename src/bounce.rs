//! Offline rendering to WAV

use std::path::Path;

use anyhow::{bail, Context};
use log::info;

use crate::platform::BlockSource;

/// Frames rendered per block while bouncing
pub const BOUNCE_BLOCK: usize = 512;

/// Render `frames` frames of `source` into a mono 32-bit float WAV at
/// `path`. Returns the peak absolute sample value.
pub fn bounce_to_wav<S: BlockSource + ?Sized>(source: &mut S, frames: usize, path: impl AsRef<Path>) -> anyhow::Result<f32> {
    let path = path.as_ref();
    let rate = source.sample_rate();
    if !rate.is_finite() || rate < 1.0 {
        bail!("cannot bounce at {} Hz", rate);
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate.round() as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("failed to create {}", path.display()))?;

    let mut block = vec![0.0f32; BOUNCE_BLOCK];
    let mut remaining = frames;
    let mut peak = 0.0f32;
    while remaining > 0 {
        let len = remaining.min(BOUNCE_BLOCK);
        let block = &mut block[..len];
        source.render(block);
        for &sample in block.iter() {
            peak = peak.max(sample.abs());
            writer.write_sample(sample)?;
        }
        remaining -= len;
    }
    writer
        .finalize()
        .with_context(|| format!("failed to finalize {}", path.display()))?;

    info!(
        "bounced {:.2}s to {} (peak {:.3})",
        frames as f32 / rate,
        path.display(),
        peak
    );
    Ok(peak)
}

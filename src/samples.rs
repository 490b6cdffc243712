//! Decoded sample buffers and a name-keyed cache of them
//!
//! Buffers are mono. Multichannel files are mixed down on load; playback
//! converts between the buffer's rate and the context rate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use log::{debug, info};

/// A ready-to-play mono audio buffer
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    frames: Vec<f32>,
    sample_rate: f32,
}

impl SampleBuffer {
    pub fn new(frames: Vec<f32>, sample_rate: f32) -> Self {
        Self { frames, sample_rate }
    }

    /// Decode a WAV file, mixing all channels down to mono
    pub fn from_wav(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut reader =
            hound::WavReader::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .with_context(|| format!("failed to decode {}", path.display()))?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    bail!("unsupported bit depth {} in {}", spec.bits_per_sample, path.display());
                }
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .with_context(|| format!("failed to decode {}", path.display()))?
            }
        };

        let frames = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        debug!(
            "decoded {} ({} Hz, {} ch, {} bit)",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample
        );
        Ok(Self::new(frames, spec.sample_rate as f32))
    }

    /// Sine sweep from `start_hz` to `end_hz` under an exponential decay.
    ///
    /// Stands in for a missing drum sample: a low sweep reads as a kick, a
    /// high steady tone as a tick.
    pub fn decaying_tone(sample_rate: f32, start_hz: f32, end_hz: f32, decay: f32) -> Self {
        let decay = decay.max(0.005);
        let len = (sample_rate * decay * 4.0) as usize;
        let mut phase = 0.0f32;
        let frames = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate;
                let sweep = (-t / (decay * 0.5)).exp();
                let freq = end_hz + (start_hz - end_hz) * sweep;
                phase = (phase + freq / sample_rate).fract();
                (phase * std::f32::consts::TAU).sin() * (-t / decay).exp()
            })
            .collect();
        Self::new(frames, sample_rate)
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Length in seconds
    pub fn duration(&self) -> f32 {
        if self.sample_rate > 0.0 {
            self.frames.len() as f32 / self.sample_rate
        } else {
            0.0
        }
    }
}

/// Cache of decoded buffers keyed by identifier
///
/// `acquire("kick")` loads `<root>/kick.wav` the first time and hands out the
/// shared buffer afterwards.
pub struct SampleBank {
    root: PathBuf,
    buffers: HashMap<String, Arc<SampleBuffer>>,
}

impl SampleBank {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            buffers: HashMap::new(),
        }
    }

    /// Register an already decoded (or synthesized) buffer under `name`
    pub fn insert(&mut self, name: impl Into<String>, buffer: SampleBuffer) -> Arc<SampleBuffer> {
        let buffer = Arc::new(buffer);
        self.buffers.insert(name.into(), buffer.clone());
        buffer
    }

    pub fn get(&self, name: &str) -> Option<Arc<SampleBuffer>> {
        self.buffers.get(name).cloned()
    }

    pub fn acquire(&mut self, name: &str) -> anyhow::Result<Arc<SampleBuffer>> {
        if let Some(buffer) = self.buffers.get(name) {
            return Ok(buffer.clone());
        }

        let path = self.root.join(format!("{}.wav", name));
        let buffer = Arc::new(
            SampleBuffer::from_wav(&path).with_context(|| format!("failed to load sample '{}'", name))?,
        );
        info!("loaded sample '{}' ({:.3}s)", name, buffer.duration());
        self.buffers.insert(name.to_string(), buffer.clone());
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, spec: hound::WavSpec, samples: &[i16]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_stereo_wav_is_mixed_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clap.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        write_wav(&path, spec, &[16384, 0, -16384, -16384]);

        let buffer = SampleBuffer::from_wav(&path).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.sample_rate(), 22050.0);
        assert!((buffer.frames()[0] - 0.25).abs() < 1e-4);
        assert!((buffer.frames()[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_bank_caches_loaded_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        write_wav(&dir.path().join("kick.wav"), spec, &[1000, 2000, 3000]);

        let mut bank = SampleBank::new(dir.path());
        let first = bank.acquire("kick").unwrap();
        let second = bank.acquire("kick").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn test_bank_missing_sample_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut bank = SampleBank::new(dir.path());
        assert!(bank.acquire("nope").is_err());
        assert!(bank.is_empty());
    }
}

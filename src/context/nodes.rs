use std::sync::Arc;

use crate::samples::SampleBuffer;

/// One-shot buffer player
///
/// Plays its buffer once from the start and then reports itself finished.
/// Buffers recorded at another rate are resampled with linear interpolation.
pub struct BufferSource {
    buffer: Arc<SampleBuffer>,
    position: f64,
    step: f64,
    started: bool,
    finished: bool,
}

impl BufferSource {
    pub fn new(buffer: Arc<SampleBuffer>, context_rate: f32) -> Self {
        let step = if context_rate > 0.0 && buffer.sample_rate() > 0.0 {
            buffer.sample_rate() as f64 / context_rate as f64
        } else {
            1.0
        };
        let finished = buffer.is_empty();
        Self {
            buffer,
            position: 0.0,
            step,
            started: false,
            finished,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if !self.started || self.finished {
            return 0.0;
        }

        let frames = self.buffer.frames();
        let index = self.position as usize;
        if index >= frames.len() {
            self.finished = true;
            return 0.0;
        }

        let frac = (self.position - index as f64) as f32;
        let current = frames[index];
        let next = frames.get(index + 1).copied().unwrap_or(0.0);
        let sample = current + (next - current) * frac;

        self.position += self.step;
        if self.position as usize >= frames.len() {
            self.finished = true;
        }
        sample
    }
}

/// Fixed gain stage
pub struct GainNode {
    gain: f32,
}

impl GainNode {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: if gain.is_finite() { gain.max(0.0) } else { 0.0 },
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    #[inline]
    pub fn process(&self, input: f32) -> f32 {
        input * self.gain
    }
}

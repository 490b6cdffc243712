//! Feedback delay node
//!
//! Time, feedback and wet level are smoothed so that dragging them while a
//! pattern plays does not click. The delay line is allocated once for the
//! maximum delay time and never resized.

use crate::effects::params::{DelayParams, MAX_DELAY_FEEDBACK};
use crate::effects::Effect;
use crate::utils::smoother::SmoothedParam;

/// Threshold for flushing denormal numbers to zero
const DENORMAL_THRESHOLD: f32 = 1e-15;

/// Shortest delay the node accepts, in seconds
const MIN_DELAY_TIME: f32 = 0.01;

/// Delay with feedback and wet/dry mix
///
/// Parameters:
/// - Time: delay time in seconds (0.01 to the allocated maximum)
/// - Feedback: amount of delayed signal fed back (0.0 to 0.9)
/// - Wet: 0.0 = dry only, 1.0 = wet only
pub struct FeedbackDelay {
    sample_rate: f32,

    buffer: Vec<f32>,
    write_index: usize,

    time: SmoothedParam,
    feedback: SmoothedParam,
    wet: SmoothedParam,
}

impl FeedbackDelay {
    /// Create a new delay
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `max_time` - Longest delay the line can hold, in seconds
    /// * `params` - Initial time, feedback and wet level
    pub fn new(sample_rate: f32, max_time: f32, params: DelayParams) -> Self {
        let max_time = max_time.max(MIN_DELAY_TIME);
        let buffer_size = (sample_rate * max_time) as usize + 2;

        Self {
            sample_rate,
            buffer: vec![0.0; buffer_size],
            write_index: 0,
            // 50ms for time avoids zipper noise, 30ms is enough for the rest
            time: SmoothedParam::new(params.time, MIN_DELAY_TIME, max_time, sample_rate, 50.0),
            feedback: SmoothedParam::new(params.feedback, 0.0, MAX_DELAY_FEEDBACK, sample_rate, 30.0),
            wet: SmoothedParam::new(params.wet, 0.0, 1.0, sample_rate, 30.0),
        }
    }

    /// Push a full parameter set; the audible value glides to it
    pub fn set_params(&mut self, params: &DelayParams) {
        self.time.set_target(params.time);
        self.feedback.set_target(params.feedback);
        self.wet.set_target(params.wet);
    }

    /// Current target parameters
    pub fn params(&self) -> DelayParams {
        DelayParams {
            time: self.time.target(),
            feedback: self.feedback.target(),
            wet: self.wet.target(),
        }
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_index = 0;
    }
}

impl Effect for FeedbackDelay {
    fn process(&mut self, input: f32) -> f32 {
        let input = if input.is_finite() { input } else { 0.0 };

        let time = self.time.tick();
        let feedback = self.feedback.tick();
        let wet = self.wet.tick();

        let delay_samples = time * self.sample_rate;
        let delay_int = delay_samples as usize;
        let delay_frac = delay_samples - delay_int as f32;

        let buffer_len = self.buffer.len();

        // Linear interpolation between adjacent taps for smooth time changes
        let read_index_1 = (self.write_index + buffer_len - delay_int) % buffer_len;
        let read_index_2 = (self.write_index + buffer_len - delay_int - 1) % buffer_len;
        let delayed = self.buffer[read_index_1] * (1.0 - delay_frac) + self.buffer[read_index_2] * delay_frac;

        let mut write_sample = input + delayed * feedback;
        if write_sample.abs() < DENORMAL_THRESHOLD || !write_sample.is_finite() {
            write_sample = 0.0;
        }

        self.buffer[self.write_index] = write_sample;
        self.write_index = (self.write_index + 1) % buffer_len;

        let output = input * (1.0 - wet) + delayed * wet;
        if output.is_finite() {
            output
        } else {
            input
        }
    }

    fn reset(&mut self) {
        FeedbackDelay::reset(self);
    }
}

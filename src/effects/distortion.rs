//! Waveshaping distortion with optional oversampling
//!
//! The transfer curve is `(3 + k) * x * 20° / (π + k * |x|)` with
//! `k = amount * 100`. Oversampling runs the curve on linearly interpolated
//! intermediate points and averages them back down, which tames the aliasing
//! the curve produces at high amounts.

use std::f32::consts::PI;

use crate::effects::params::{DistortionParams, Oversample};
use crate::effects::Effect;
use crate::utils::smoother::SmoothedParam;

const DEG: f32 = PI / 180.0;

pub struct Distortion {
    amount: f32,
    k: f32,
    oversample: Oversample,
    wet: SmoothedParam,
    /// Previous input, for interpolating the oversampled points
    last_input: f32,
}

impl Distortion {
    pub fn new(sample_rate: f32, params: DistortionParams) -> Self {
        let mut distortion = Self {
            amount: 0.0,
            k: 0.0,
            oversample: params.oversample,
            wet: SmoothedParam::new_normalized(params.wet, sample_rate),
            last_input: 0.0,
        };
        distortion.set_params(&params);
        distortion
    }

    pub fn set_params(&mut self, params: &DistortionParams) {
        self.amount = params.amount.clamp(0.0, 1.0);
        self.k = self.amount * 100.0;
        self.oversample = params.oversample;
        self.wet.set_target(params.wet);
    }

    pub fn params(&self) -> DistortionParams {
        DistortionParams {
            amount: self.amount,
            oversample: self.oversample,
            wet: self.wet.target(),
        }
    }

    #[inline]
    fn shape(&self, x: f32) -> f32 {
        let x = x.clamp(-1.0, 1.0);
        (3.0 + self.k) * x * 20.0 * DEG / (PI + self.k * x.abs())
    }
}

impl Effect for Distortion {
    fn process(&mut self, input: f32) -> f32 {
        let input = if input.is_finite() { input } else { 0.0 };
        let wet = self.wet.tick();

        let factor = self.oversample.factor();
        let shaped = if factor == 1 {
            self.shape(input)
        } else {
            let step = 1.0 / factor as f32;
            let mut sum = 0.0;
            for i in 1..=factor {
                let t = i as f32 * step;
                sum += self.shape(self.last_input + (input - self.last_input) * t);
            }
            sum / factor as f32
        };
        self.last_input = input;

        input * (1.0 - wet) + shaped * wet
    }

    fn reset(&mut self) {
        self.last_input = 0.0;
    }
}

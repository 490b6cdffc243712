use std::f32::consts::PI;

use crate::effects::params::{FilterParams, FilterType};
use crate::effects::Effect;

/// One RBJ cookbook biquad section, Direct Form I
#[derive(Clone, Debug, Default)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    fn set_coefficients(&mut self, coeffs: &Coefficients) {
        self.b0 = coeffs.b0;
        self.b1 = coeffs.b1;
        self.b2 = coeffs.b2;
        self.a1 = coeffs.a1;
        self.a2 = coeffs.a2;
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = if output.abs() < 1e-15 { 0.0 } else { output };

        self.y1
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Normalized (a0 = 1) biquad coefficients
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    fn calculate(sample_rate: f32, params: &FilterParams) -> Self {
        let nyquist = sample_rate * 0.5;
        let freq = params.frequency.clamp(20.0, nyquist * 0.95);
        let q = params.q.clamp(0.1, 30.0);

        let omega0 = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega0.sin();
        let cos_omega = omega0.cos();
        let alpha = sin_omega / (2.0 * q);

        let (b0, b1, b2) = match params.filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_omega;
                (b1 * 0.5, b1, b1 * 0.5)
            }
            FilterType::Highpass => {
                let b1 = -(1.0 + cos_omega);
                (-b1 * 0.5, b1, -b1 * 0.5)
            }
            // Constant 0 dB peak gain
            FilterType::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Multi-mode filter built from identical cascaded biquads
///
/// The number of sections follows the rolloff: -12 dB/oct is a single
/// biquad, -96 dB/oct is eight of them. Filters are not crossfaded; the
/// output is always fully wet.
pub struct FilterCascade {
    sample_rate: f32,
    params: FilterParams,
    stages: Vec<Biquad>,
}

impl FilterCascade {
    pub fn new(sample_rate: f32, params: FilterParams) -> Self {
        let mut filter = Self {
            sample_rate,
            params,
            stages: Vec::new(),
        };
        filter.set_params(&params);
        filter
    }

    pub fn set_params(&mut self, params: &FilterParams) {
        self.params = *params;

        // Existing sections keep their state so a rolloff change doesn't pop
        self.stages.resize(params.rolloff.stages(), Biquad::default());

        let coeffs = Coefficients::calculate(self.sample_rate, params);
        for stage in &mut self.stages {
            stage.set_coefficients(&coeffs);
        }
    }

    pub fn params(&self) -> FilterParams {
        self.params
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl Effect for FilterCascade {
    fn process(&mut self, input: f32) -> f32 {
        let mut out = if input.is_finite() { input } else { 0.0 };
        for stage in &mut self.stages {
            out = stage.process(out);
        }
        if out.is_finite() {
            out
        } else {
            self.reset();
            0.0
        }
    }

    fn reset(&mut self) {
        self.stages.iter_mut().for_each(Biquad::reset);
    }
}

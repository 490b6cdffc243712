//! Freeverb-style room reverb
//!
//! Eight parallel lowpass-feedback comb filters feed four series allpass
//! filters. The comb damping lowpass cutoff is the node's native
//! `dampening` parameter (Hz); the semantic `decay` parameter reaches it via
//! `ReverbParams::dampening`.

use std::f32::consts::PI;

use crate::effects::params::{ReverbParams, DAMPENING_PER_SECOND};
use crate::effects::Effect;
use crate::utils::smoother::SmoothedParam;

/// Comb delay lengths in samples at 44.1kHz
const COMB_TUNINGS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];

/// Allpass delay lengths in samples at 44.1kHz
const ALLPASS_TUNINGS: [usize; 4] = [225, 556, 441, 341];

const TUNING_SAMPLE_RATE: f32 = 44100.0;

const ALLPASS_FEEDBACK: f32 = 0.5;

/// Input attenuation so eight summed combs don't clip
const FIXED_GAIN: f32 = 0.015;

const DENORMAL_THRESHOLD: f32 = 1e-15;

struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    filter_store: f32,
}

impl CombFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            index: 0,
            filter_store: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.index];

        // One-pole lowpass in the feedback path
        self.filter_store = output * (1.0 - damp) + self.filter_store * damp;
        if self.filter_store.abs() < DENORMAL_THRESHOLD {
            self.filter_store = 0.0;
        }

        self.buffer[self.index] = input + self.filter_store * feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
        self.filter_store = 0.0;
    }
}

struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllpassFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        let output = buffered - input;
        self.buffer[self.index] = input + buffered * ALLPASS_FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

pub struct Freeverb {
    sample_rate: f32,
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,

    room_size: f32,
    decay: f32,
    dampening: f32,
    wet: SmoothedParam,

    // Derived from room_size / dampening
    feedback: f32,
    damp: f32,
}

impl Freeverb {
    pub fn new(sample_rate: f32, params: ReverbParams) -> Self {
        let scale = sample_rate / TUNING_SAMPLE_RATE;
        let combs = COMB_TUNINGS
            .iter()
            .map(|&len| CombFilter::new((len as f32 * scale) as usize))
            .collect();
        let allpasses = ALLPASS_TUNINGS
            .iter()
            .map(|&len| AllpassFilter::new((len as f32 * scale) as usize))
            .collect();

        let mut reverb = Self {
            sample_rate,
            combs,
            allpasses,
            room_size: 0.0,
            decay: 0.0,
            dampening: 0.0,
            wet: SmoothedParam::new_normalized(params.wet, sample_rate),
            feedback: 0.0,
            damp: 0.0,
        };
        reverb.set_params(&params);
        reverb
    }

    pub fn set_params(&mut self, params: &ReverbParams) {
        self.set_room_size(params.room_size);
        self.set_dampening(params.dampening());
        self.decay = params.decay;
        self.wet.set_target(params.wet);
    }

    pub fn params(&self) -> ReverbParams {
        ReverbParams {
            room_size: self.room_size,
            decay: self.decay,
            wet: self.wet.target(),
        }
    }

    pub fn set_room_size(&mut self, room_size: f32) {
        self.room_size = room_size.clamp(0.0, 1.0);
        self.feedback = 0.7 + 0.28 * self.room_size;
    }

    /// Damping lowpass cutoff in Hz
    pub fn set_dampening(&mut self, dampening: f32) {
        self.dampening = dampening;
        self.decay = dampening / DAMPENING_PER_SECOND;
        // Keep the one-pole well below Nyquist
        let cutoff = dampening.clamp(20.0, self.sample_rate * 0.49);
        self.damp = (-2.0 * PI * cutoff / self.sample_rate).exp();
    }

    pub fn room_size(&self) -> f32 {
        self.room_size
    }

    pub fn dampening(&self) -> f32 {
        self.dampening
    }

    pub fn reset(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::reset);
        self.allpasses.iter_mut().for_each(AllpassFilter::reset);
    }
}

impl Effect for Freeverb {
    fn process(&mut self, input: f32) -> f32 {
        let input = if input.is_finite() { input } else { 0.0 };
        let wet = self.wet.tick();

        let scaled = input * FIXED_GAIN;
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(scaled, self.feedback, self.damp);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }

        input * (1.0 - wet) + out * wet
    }

    fn reset(&mut self) {
        Freeverb::reset(self);
    }
}

//! Effect kinds, their parameter shapes and partial updates
//!
//! Each kind owns one parameter struct. Values are clamped into their legal
//! range whenever they are constructed or merged, so a node never sees an
//! out-of-range setting. Partial updates (`EffectPatch`) carry the kind in
//! their variant, which makes a delay-shaped update to a filter entry a
//! reported error instead of a silent mis-write.

use anyhow::{anyhow, bail};
use std::fmt;
use std::str::FromStr;

/// Reverb damping cutoff in Hz per second of decay.
pub const DAMPENING_PER_SECOND: f32 = 3000.0;

/// Feedback ceiling for the delay; anything at or above 1.0 runs away.
pub const MAX_DELAY_FEEDBACK: f32 = 0.9;

/// The closed set of effects a track can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    Reverb,
    Delay,
    Distortion,
    Filter,
}

impl EffectKind {
    pub const ALL: [EffectKind; 4] = [
        EffectKind::Reverb,
        EffectKind::Delay,
        EffectKind::Distortion,
        EffectKind::Filter,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Reverb => "reverb",
            EffectKind::Delay => "delay",
            EffectKind::Distortion => "distortion",
            EffectKind::Filter => "filter",
        }
    }

    /// Parameters a freshly added entry of this kind starts with
    pub fn default_params(self) -> EffectParams {
        match self {
            EffectKind::Reverb => EffectParams::Reverb(ReverbParams::default()),
            EffectKind::Delay => EffectParams::Delay(DelayParams::default()),
            EffectKind::Distortion => EffectParams::Distortion(DistortionParams::default()),
            EffectKind::Filter => EffectParams::Filter(FilterParams::default()),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EffectKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("unknown effect '{}'", s))
    }
}

/// Waveshaper oversampling factor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Oversample {
    None,
    X2,
    X4,
}

impl Oversample {
    pub fn factor(self) -> usize {
        match self {
            Oversample::None => 1,
            Oversample::X2 => 2,
            Oversample::X4 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Filter slope in dB/octave. Each step doubles the number of cascaded biquads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rolloff {
    Db12,
    Db24,
    Db48,
    Db96,
}

impl Rolloff {
    /// Number of 12 dB/oct biquad sections needed for this slope
    pub fn stages(self) -> usize {
        match self {
            Rolloff::Db12 => 1,
            Rolloff::Db24 => 2,
            Rolloff::Db48 => 4,
            Rolloff::Db96 => 8,
        }
    }

    pub fn from_db(db: i32) -> Option<Self> {
        match db {
            -12 => Some(Rolloff::Db12),
            -24 => Some(Rolloff::Db24),
            -48 => Some(Rolloff::Db48),
            -96 => Some(Rolloff::Db96),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReverbParams {
    /// 0.0-1.0
    pub room_size: f32,
    /// Seconds, 0.1-10.0
    pub decay: f32,
    /// 0.0-1.0
    pub wet: f32,
}

impl ReverbParams {
    pub fn new(room_size: f32, decay: f32, wet: f32) -> Self {
        Self {
            room_size: room_size.clamp(0.0, 1.0),
            decay: decay.clamp(0.1, 10.0),
            wet: wet.clamp(0.0, 1.0),
        }
    }

    /// Comb damping cutoff in Hz derived from the decay time
    pub fn dampening(&self) -> f32 {
        self.decay * DAMPENING_PER_SECOND
    }
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self::new(0.4, 1.5, 0.3)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelayParams {
    /// Seconds, 0.01-1.0
    pub time: f32,
    /// 0.0-0.9
    pub feedback: f32,
    /// 0.0-1.0
    pub wet: f32,
}

impl DelayParams {
    pub fn new(time: f32, feedback: f32, wet: f32) -> Self {
        Self {
            time: time.clamp(0.01, 1.0),
            feedback: feedback.clamp(0.0, MAX_DELAY_FEEDBACK),
            wet: wet.clamp(0.0, 1.0),
        }
    }
}

impl Default for DelayParams {
    fn default() -> Self {
        Self::new(0.25, 0.3, 0.3)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistortionParams {
    /// 0.0-1.0
    pub amount: f32,
    pub oversample: Oversample,
    /// 0.0-1.0
    pub wet: f32,
}

impl DistortionParams {
    pub fn new(amount: f32, oversample: Oversample, wet: f32) -> Self {
        Self {
            amount: amount.clamp(0.0, 1.0),
            oversample,
            wet: wet.clamp(0.0, 1.0),
        }
    }
}

impl Default for DistortionParams {
    fn default() -> Self {
        Self::new(0.4, Oversample::None, 0.5)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterParams {
    /// Hz, 20-20000
    pub frequency: f32,
    pub filter_type: FilterType,
    pub rolloff: Rolloff,
    /// 0.1-30
    pub q: f32,
}

impl FilterParams {
    pub fn new(frequency: f32, filter_type: FilterType, rolloff: Rolloff, q: f32) -> Self {
        Self {
            frequency: frequency.clamp(20.0, 20000.0),
            filter_type,
            rolloff,
            q: q.clamp(0.1, 30.0),
        }
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self::new(2000.0, FilterType::Lowpass, Rolloff::Db12, 1.0)
    }
}

/// Full parameter set of one effect entry, tagged by kind
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectParams {
    Reverb(ReverbParams),
    Delay(DelayParams),
    Distortion(DistortionParams),
    Filter(FilterParams),
}

impl EffectParams {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectParams::Reverb(_) => EffectKind::Reverb,
            EffectParams::Delay(_) => EffectKind::Delay,
            EffectParams::Distortion(_) => EffectKind::Distortion,
            EffectParams::Filter(_) => EffectKind::Filter,
        }
    }

    /// Reject NaN and infinities; range problems are handled by clamping.
    pub fn validate(&self) -> anyhow::Result<()> {
        let values: Vec<(&str, f32)> = match self {
            EffectParams::Reverb(p) => vec![("room_size", p.room_size), ("decay", p.decay), ("wet", p.wet)],
            EffectParams::Delay(p) => vec![("time", p.time), ("feedback", p.feedback), ("wet", p.wet)],
            EffectParams::Distortion(p) => vec![("amount", p.amount), ("wet", p.wet)],
            EffectParams::Filter(p) => vec![("frequency", p.frequency), ("q", p.q)],
        };
        for (name, value) in values {
            if !value.is_finite() {
                bail!("{} parameter '{}' is not finite ({})", self.kind(), name, value);
            }
        }
        Ok(())
    }

    /// Re-clamp every field into its legal range
    pub fn clamped(self) -> Self {
        match self {
            EffectParams::Reverb(p) => EffectParams::Reverb(ReverbParams::new(p.room_size, p.decay, p.wet)),
            EffectParams::Delay(p) => EffectParams::Delay(DelayParams::new(p.time, p.feedback, p.wet)),
            EffectParams::Distortion(p) => {
                EffectParams::Distortion(DistortionParams::new(p.amount, p.oversample, p.wet))
            }
            EffectParams::Filter(p) => {
                EffectParams::Filter(FilterParams::new(p.frequency, p.filter_type, p.rolloff, p.q))
            }
        }
    }

    /// Overwrite the fields the patch specifies, keep the rest.
    ///
    /// Fails without touching `self` when the patch is for another kind or
    /// carries a non-finite value.
    pub fn merge(&mut self, patch: &EffectPatch) -> anyhow::Result<()> {
        let merged = match (*self, patch) {
            (EffectParams::Reverb(mut p), EffectPatch::Reverb(u)) => {
                p.room_size = u.room_size.unwrap_or(p.room_size);
                p.decay = u.decay.unwrap_or(p.decay);
                p.wet = u.wet.unwrap_or(p.wet);
                EffectParams::Reverb(p)
            }
            (EffectParams::Delay(mut p), EffectPatch::Delay(u)) => {
                p.time = u.time.unwrap_or(p.time);
                p.feedback = u.feedback.unwrap_or(p.feedback);
                p.wet = u.wet.unwrap_or(p.wet);
                EffectParams::Delay(p)
            }
            (EffectParams::Distortion(mut p), EffectPatch::Distortion(u)) => {
                p.amount = u.amount.unwrap_or(p.amount);
                p.oversample = u.oversample.unwrap_or(p.oversample);
                p.wet = u.wet.unwrap_or(p.wet);
                EffectParams::Distortion(p)
            }
            (EffectParams::Filter(mut p), EffectPatch::Filter(u)) => {
                p.frequency = u.frequency.unwrap_or(p.frequency);
                p.filter_type = u.filter_type.unwrap_or(p.filter_type);
                p.rolloff = u.rolloff.unwrap_or(p.rolloff);
                p.q = u.q.unwrap_or(p.q);
                EffectParams::Filter(p)
            }
            (params, patch) => {
                return Err(anyhow!(
                    "cannot apply a {} update to a {} effect",
                    patch.kind(),
                    params.kind()
                ))
            }
        };
        merged.validate()?;
        *self = merged.clamped();
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReverbPatch {
    pub room_size: Option<f32>,
    pub decay: Option<f32>,
    pub wet: Option<f32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DelayPatch {
    pub time: Option<f32>,
    pub feedback: Option<f32>,
    pub wet: Option<f32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DistortionPatch {
    pub amount: Option<f32>,
    pub oversample: Option<Oversample>,
    pub wet: Option<f32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FilterPatch {
    pub frequency: Option<f32>,
    pub filter_type: Option<FilterType>,
    pub rolloff: Option<Rolloff>,
    pub q: Option<f32>,
}

/// Partial parameter update; unspecified fields keep their value
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectPatch {
    Reverb(ReverbPatch),
    Delay(DelayPatch),
    Distortion(DistortionPatch),
    Filter(FilterPatch),
}

impl EffectPatch {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectPatch::Reverb(_) => EffectKind::Reverb,
            EffectPatch::Delay(_) => EffectKind::Delay,
            EffectPatch::Distortion(_) => EffectKind::Distortion,
            EffectPatch::Filter(_) => EffectKind::Filter,
        }
    }
}

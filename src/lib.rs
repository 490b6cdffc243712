//! Per-track effect chains and signal routing for a step sequencer
//!
//! Triggered samples play through a shared audio graph. Each track may own a
//! chain of effects (reverb, delay, distortion, filter) that the effects
//! engine rewires whenever its composition changes; the player routes every
//! trigger either through its track's chain or straight to the destination.

pub mod config;
pub mod context;
pub mod samples;

// Effects core
pub mod chain;
pub mod effects;
pub mod playback;

pub mod sequencer;
pub mod utils;

// Output: live (cpal) and offline (WAV)
pub mod bounce;
pub mod platform;

pub use chain::{EffectChain, EffectId, EffectsEngine, TrackEffect};
pub use config::{EffectsConfig, PlayerConfig, SequencerConfig};
pub use effects::{EffectKind, EffectParams, EffectPatch};
pub use playback::{Player, Route, Trigger};

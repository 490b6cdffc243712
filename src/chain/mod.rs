//! Per-track effect chains and the engine that owns them

#[allow(clippy::module_inception)]
pub mod chain;
pub mod engine;

pub use self::chain::{EffectChain, EffectId, TrackEffect};
pub use self::engine::EffectsEngine;

//! Audio output
//!
//! Anything that can fill a mono block is a `BlockSource`. Live output goes
//! through `CpalOutput` (feature `native`); offline rendering goes through
//! `crate::bounce`.

use crate::playback::Player;
use crate::sequencer::Session;

/// Producer of mono blocks at a fixed rate
pub trait BlockSource: Send {
    fn sample_rate(&self) -> f32;

    fn render(&mut self, out: &mut [f32]);
}

impl BlockSource for Player {
    fn sample_rate(&self) -> f32 {
        Player::sample_rate(self)
    }

    fn render(&mut self, out: &mut [f32]) {
        Player::render(self, out);
    }
}

impl BlockSource for Session {
    fn sample_rate(&self) -> f32 {
        self.player().sample_rate()
    }

    fn render(&mut self, out: &mut [f32]) {
        Session::render(self, out);
    }
}

/// Platform-specific output device
pub trait AudioOutput {
    /// Open the device; the rate actually granted is reported by `sample_rate`
    fn initialize(&mut self) -> anyhow::Result<()>;

    fn start(&mut self) -> anyhow::Result<()>;

    fn stop(&mut self) -> anyhow::Result<()>;

    fn sample_rate(&self) -> f32;

    fn is_active(&self) -> bool;
}

#[cfg(feature = "native")]
pub mod cpal_output;

#[cfg(feature = "native")]
pub use self::cpal_output::CpalOutput;

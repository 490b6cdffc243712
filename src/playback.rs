//! One-shot sample playback and the per-trigger routing decision
//!
//! `Player` owns the shared audio context and, when the backend came up, the
//! effects engine. Every trigger builds a fresh source/gain pair and patches
//! the gain either into the track's chain input or straight into the
//! destination. The pair is never reused; the graph reaps it once the source
//! has played out.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::chain::EffectsEngine;
use crate::config::PlayerConfig;
use crate::context::{AudioContext, BufferSource, GainNode, GraphNode, NodeId};
use crate::samples::{SampleBank, SampleBuffer};

/// Where a triggered voice was patched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Straight into the shared destination
    Direct,
    /// Into the input boundary of a track's chain
    Chain { track: usize, input: NodeId },
}

/// The transient nodes of one trigger
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trigger {
    pub source: NodeId,
    pub gain: NodeId,
    pub route: Route,
}

pub struct Player {
    context: AudioContext,
    effects: Option<EffectsEngine>,
}

impl Player {
    /// Create the audio context and try to bring up the effects backend.
    ///
    /// A backend that fails to start is logged and leaves the player in
    /// direct-only mode.
    pub fn new(config: PlayerConfig) -> Self {
        let context = AudioContext::new(config.sample_rate);
        let effects = if config.effects_enabled {
            match EffectsEngine::new(context.clone(), config.effects) {
                Ok(engine) => Some(engine),
                Err(err) => {
                    warn!("effects unavailable, playing dry: {:#}", err);
                    None
                }
            }
        } else {
            info!("effects disabled, playing dry");
            None
        };

        Self { context, effects }
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn sample_rate(&self) -> f32 {
        self.context.sample_rate()
    }

    /// The effects engine, or `None` when the backend is unavailable
    pub fn effects_engine(&self) -> Option<&EffectsEngine> {
        self.effects.as_ref()
    }

    pub fn effects_engine_mut(&mut self) -> Option<&mut EffectsEngine> {
        self.effects.as_mut()
    }

    /// Play `buffer` once at `volume`, through `track`'s chain if it has
    /// anything enabled.
    ///
    /// Only failing to create the voice itself is an error. Any problem
    /// with the chain falls back to the destination for this trigger.
    pub fn trigger(&mut self, track: Option<usize>, buffer: &Arc<SampleBuffer>, volume: f32) -> anyhow::Result<Trigger> {
        let chain_input = self.chain_input_for(track);

        let mut graph = self.context.lock()?;
        let rate = graph.sample_rate();
        let source = graph.add_node(GraphNode::Source(BufferSource::new(Arc::clone(buffer), rate)));
        let gain = graph.add_node(GraphNode::Gain(GainNode::new(volume)));
        if let Err(err) = graph.connect(source, gain) {
            graph.remove_node(source);
            graph.remove_node(gain);
            return Err(err);
        }

        let mut route = Route::Direct;
        if let (Some(track), Some(input)) = (track, chain_input) {
            match graph.connect(gain, input) {
                Ok(()) => route = Route::Chain { track, input },
                Err(err) => warn!("routing track {} into its chain failed, playing dry: {:#}", track, err),
            }
        }
        if route == Route::Direct {
            let destination = graph.destination();
            if let Err(err) = graph.connect(gain, destination) {
                graph.remove_node(source);
                graph.remove_node(gain);
                return Err(err);
            }
        }

        graph.start_voice(source, gain)?;
        debug!("trigger on {:?} -> {:?}", track, route);
        Ok(Trigger { source, gain, route })
    }

    /// Acquire `name` from `bank` and trigger it; a failed load skips the
    /// trigger and leaves every chain untouched.
    pub fn trigger_sample(
        &mut self,
        track: Option<usize>,
        bank: &mut SampleBank,
        name: &str,
        volume: f32,
    ) -> Option<Trigger> {
        let buffer = match bank.acquire(name) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!("skipping trigger of '{}': {:#}", name, err);
                return None;
            }
        };
        match self.trigger(track, &buffer, volume) {
            Ok(trigger) => Some(trigger),
            Err(err) => {
                warn!("trigger of '{}' failed: {:#}", name, err);
                None
            }
        }
    }

    /// Render a block of the shared destination
    pub fn render(&self, out: &mut [f32]) {
        self.context.render(out);
    }

    /// Input boundary to route `track` through, if it should go through one
    fn chain_input_for(&mut self, track: Option<usize>) -> Option<NodeId> {
        let track = track?;
        let engine = self.effects.as_mut()?;
        match engine.get_chain_input(track) {
            Ok(input) if engine.has_enabled_effects(track) => Some(input),
            Ok(_) => None,
            Err(err) => {
                warn!("no chain input for track {}, playing dry: {:#}", track, err);
                None
            }
        }
    }
}

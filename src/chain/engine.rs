//! Per-track effect chains and the operations the UI drives them with
//!
//! The engine is the only owner of chain state and processing nodes. Every
//! operation takes the graph lock once and completes inside it, so the
//! audio thread sees either the old signal path or the new one.
//!
//! Topology changes (add, remove, toggle) rebuild the chain's connections
//! from scratch instead of patching them. Chains hold a handful of entries
//! and change far less often than sounds are triggered, so a full rebuild
//! is the simplest thing that is obviously correct.
//!
//! Failures stay inside the engine: they are logged and reported as `false`
//! or `None`, never propagated to the scheduler.

use std::collections::BTreeMap;

use anyhow::bail;
use log::{debug, info, warn};

use super::chain::{EffectChain, EffectId, TrackEffect};
use crate::config::EffectsConfig;
use crate::context::{AudioContext, AudioGraph, GraphNode, NodeId};
use crate::effects::{EffectFactory, EffectKind, EffectParams, EffectPatch};

pub struct EffectsEngine {
    context: AudioContext,
    factory: EffectFactory,
    config: EffectsConfig,
    chains: BTreeMap<usize, EffectChain>,
    next_id: u64,
    disposed: bool,
}

impl EffectsEngine {
    /// Start the effects backend on a shared context.
    ///
    /// Fails when the context runs at a rate the effect nodes are not built
    /// for; the caller is expected to fall back to direct playback.
    pub fn new(context: AudioContext, config: EffectsConfig) -> anyhow::Result<Self> {
        let rate = context.sample_rate();
        if !rate.is_finite() || rate < config.min_sample_rate || rate > config.max_sample_rate {
            bail!(
                "effects backend unavailable at {} Hz (supported {}-{} Hz)",
                rate,
                config.min_sample_rate,
                config.max_sample_rate
            );
        }
        // Make sure the graph is reachable before claiming to be up
        drop(context.lock()?);

        info!("effects engine started at {} Hz", rate);
        Ok(Self {
            factory: EffectFactory::new(rate, &config),
            context,
            config,
            chains: BTreeMap::new(),
            next_id: 1,
            disposed: false,
        })
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Chain for `track`, created with no entries on first use
    pub fn get_or_create_chain(&mut self, track: usize) -> anyhow::Result<&EffectChain> {
        if self.disposed {
            bail!("effects engine has been disposed");
        }
        if !self.chains.contains_key(&track) {
            let mut graph = self.context.lock()?;
            let chain = EffectChain::new(&self.context, &mut graph, track)?;
            debug!("created chain for track {}", track);
            self.chains.insert(track, chain);
        }
        self.chains
            .get(&track)
            .ok_or_else(|| anyhow::anyhow!("chain for track {} vanished", track))
    }

    /// Existing chain for `track`, without creating one
    pub fn chain(&self, track: usize) -> Option<&EffectChain> {
        self.chains.get(&track)
    }

    /// Entries of `track` in signal order; empty if the track has no chain
    pub fn effects(&self, track: usize) -> &[TrackEffect] {
        self.chains.get(&track).map(EffectChain::effects).unwrap_or(&[])
    }

    pub fn tracks(&self) -> impl Iterator<Item = usize> + '_ {
        self.chains.keys().copied()
    }

    /// Append an entry of `kind` with its default parameters
    pub fn add_effect(&mut self, track: usize, kind: EffectKind) -> Option<EffectId> {
        self.add_effect_with(track, kind.default_params())
    }

    /// Append an entry with explicit initial parameters
    pub fn add_effect_with(&mut self, track: usize, params: EffectParams) -> Option<EffectId> {
        match self.try_add_effect(track, params) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("could not add {} to track {}: {:#}", params.kind(), track, err);
                None
            }
        }
    }

    fn try_add_effect(&mut self, track: usize, params: EffectParams) -> anyhow::Result<EffectId> {
        let kind = params.kind();
        let len = self.get_or_create_chain(track)?.len();
        if len >= self.config.max_effects_per_chain {
            bail!("chain is full ({} entries)", len);
        }

        let node = self.factory.create(kind, &params)?;
        let params = node.params();

        let mut graph = self.context.lock()?;
        let chain = self
            .chains
            .get_mut(&track)
            .ok_or_else(|| anyhow::anyhow!("no chain for track {}", track))?;
        let owned = self.context.adopt(&mut graph, GraphNode::Effect(node));
        let id = EffectId(self.next_id);
        self.next_id += 1;

        chain.push(
            TrackEffect {
                id,
                kind,
                params,
                enabled: true,
            },
            owned,
        );
        Self::rebuild_locked(chain, &mut graph);
        debug!("added {} {} to track {}", kind, id, track);
        Ok(id)
    }

    /// Remove entry `id` and release its node. Unknown ids are ignored.
    pub fn remove_effect(&mut self, track: usize, id: EffectId) -> bool {
        let Some(chain) = self.chains.get_mut(&track) else {
            return false;
        };
        let Some(index) = chain.position(id) else {
            return false;
        };
        let mut graph = match self.context.lock() {
            Ok(graph) => graph,
            Err(err) => {
                warn!("could not remove {} from track {}: {:#}", id, track, err);
                return false;
            }
        };

        let (effect, node) = chain.remove_at(index);
        node.release(&mut graph);
        Self::rebuild_locked(chain, &mut graph);
        debug!("removed {} {} from track {}", effect.kind, id, track);
        true
    }

    /// Merge `patch` into entry `id` and push the result onto its node.
    ///
    /// No rebuild: parameters never change the topology. Unknown ids and
    /// patches of the wrong kind are ignored (the latter with a warning).
    pub fn update_effect(&mut self, track: usize, id: EffectId, patch: &EffectPatch) -> bool {
        let Some(chain) = self.chains.get_mut(&track) else {
            return false;
        };
        let Some(index) = chain.position(id) else {
            return false;
        };
        let Some(node_id) = chain.node_of(id) else {
            return false;
        };

        let mut graph = match self.context.lock() {
            Ok(graph) => graph,
            Err(err) => {
                warn!("could not update {} on track {}: {:#}", id, track, err);
                return false;
            }
        };
        let Some(effect) = chain.effect_at_mut(index) else {
            return false;
        };

        let mut merged = effect.params;
        if let Err(err) = merged.merge(patch) {
            warn!("ignoring update for {} on track {}: {:#}", id, track, err);
            return false;
        }
        let Some(node) = graph.effect_mut(node_id) else {
            warn!("node for {} on track {} is missing", id, track);
            return false;
        };
        if let Err(err) = EffectFactory::apply_params(node, &merged) {
            warn!("could not apply update for {} on track {}: {:#}", id, track, err);
            return false;
        }
        effect.params = node.params();
        true
    }

    /// Flip entry `id` between enabled and bypassed. Unknown ids are ignored.
    pub fn toggle_effect(&mut self, track: usize, id: EffectId) -> bool {
        let Some(chain) = self.chains.get_mut(&track) else {
            return false;
        };
        let Some(index) = chain.position(id) else {
            return false;
        };
        let mut graph = match self.context.lock() {
            Ok(graph) => graph,
            Err(err) => {
                warn!("could not toggle {} on track {}: {:#}", id, track, err);
                return false;
            }
        };
        let Some(effect) = chain.effect_at_mut(index) else {
            return false;
        };
        effect.enabled = !effect.enabled;
        let enabled = effect.enabled;

        Self::rebuild_locked(chain, &mut graph);
        debug!(
            "{} {} on track {}",
            if enabled { "enabled" } else { "bypassed" },
            id,
            track
        );
        true
    }

    /// Set entry `id`'s enabled flag; a no-op when it already has that value
    pub fn set_effect_enabled(&mut self, track: usize, id: EffectId, enabled: bool) -> bool {
        let current = self.chain(track).and_then(|c| c.effect(id)).map(|e| e.enabled);
        match current {
            Some(current) if current == enabled => true,
            Some(_) => self.toggle_effect(track, id),
            None => false,
        }
    }

    /// Entry point of `track`'s chain for the routing bridge
    pub fn get_chain_input(&mut self, track: usize) -> anyhow::Result<NodeId> {
        Ok(self.get_or_create_chain(track)?.input())
    }

    pub fn has_enabled_effects(&self, track: usize) -> bool {
        self.chains.get(&track).is_some_and(EffectChain::has_enabled)
    }

    /// Live path from `track`'s input to its output, boundaries included
    pub fn signal_path(&self, track: usize) -> Vec<NodeId> {
        let Some(chain) = self.chains.get(&track) else {
            return Vec::new();
        };
        match self.context.lock() {
            Ok(graph) => chain.signal_path(&graph),
            Err(_) => Vec::new(),
        }
    }

    /// Parameter state held by the live node of entry `id`
    pub fn node_params(&self, track: usize, id: EffectId) -> Option<EffectParams> {
        let node_id = self.chains.get(&track)?.node_of(id)?;
        let graph = self.context.lock().ok()?;
        graph.effect(node_id).map(|node| node.params())
    }

    /// Release every chain and its nodes. The engine is unusable afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let chains = std::mem::take(&mut self.chains);
        let count = chains.len();
        match self.context.lock() {
            Ok(mut graph) => {
                for chain in chains.into_values() {
                    chain.release(&mut graph);
                }
            }
            Err(err) => {
                warn!("disposing effects engine without graph access: {:#}", err);
                // The handles drop here and try again on their own
                drop(chains);
            }
        }
        info!("effects engine disposed ({} chains)", count);
    }

    fn rebuild_locked(chain: &EffectChain, graph: &mut AudioGraph) {
        if let Err(err) = chain.rebuild(graph) {
            warn!("rebuild of track {} failed: {:#}", chain.track(), err);
        } else {
            debug!(
                "rebuilt track {}: {} of {} effects active",
                chain.track(),
                chain.enabled_count(),
                chain.len()
            );
        }
    }
}

impl Drop for EffectsEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

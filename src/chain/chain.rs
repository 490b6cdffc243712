use std::fmt;

use anyhow::Context;

use crate::context::{AudioContext, AudioGraph, GraphNode, NodeId, OwnedNode};
use crate::effects::{EffectKind, EffectParams};

/// Identity of one effect entry, unique for the lifetime of an engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(pub(crate) u64);

impl EffectId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fx-{}", self.0)
    }
}

/// One entry in a track's chain, as the UI sees it
#[derive(Clone, Debug, PartialEq)]
pub struct TrackEffect {
    pub id: EffectId,
    pub kind: EffectKind,
    pub params: EffectParams,
    pub enabled: bool,
}

/// The ordered effects of one track plus their live nodes
///
/// `effects[i]` is always rendered by `nodes[i]`. The input and output
/// boundaries keep their identity for the chain's whole life; the output is
/// wired to the destination when the chain is created and stays wired.
pub struct EffectChain {
    track: usize,
    effects: Vec<TrackEffect>,
    nodes: Vec<OwnedNode>,
    input: OwnedNode,
    output: OwnedNode,
}

impl EffectChain {
    /// Create an empty chain, `input -> output -> destination`
    pub(crate) fn new(context: &AudioContext, graph: &mut AudioGraph, track: usize) -> anyhow::Result<Self> {
        let input = context.adopt(graph, GraphNode::Boundary);
        let output = context.adopt(graph, GraphNode::Boundary);

        let destination = graph.destination();
        let wired = graph
            .connect(output.id(), destination)
            .and_then(|_| graph.connect(input.id(), output.id()));
        if let Err(err) = wired {
            input.release(graph);
            output.release(graph);
            return Err(err).with_context(|| format!("failed to wire chain for track {}", track));
        }

        Ok(Self {
            track,
            effects: Vec::new(),
            nodes: Vec::new(),
            input,
            output,
        })
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn effects(&self) -> &[TrackEffect] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.effects.iter().filter(|e| e.enabled).count()
    }

    pub fn has_enabled(&self) -> bool {
        self.effects.iter().any(|e| e.enabled)
    }

    pub fn input(&self) -> NodeId {
        self.input.id()
    }

    pub fn output(&self) -> NodeId {
        self.output.id()
    }

    /// Processing nodes in chain order, co-indexed with `effects()`
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(OwnedNode::id).collect()
    }

    pub fn position(&self, id: EffectId) -> Option<usize> {
        self.effects.iter().position(|e| e.id == id)
    }

    pub fn effect(&self, id: EffectId) -> Option<&TrackEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    /// Node rendering the entry `id`
    pub fn node_of(&self, id: EffectId) -> Option<NodeId> {
        self.position(id).map(|i| self.nodes[i].id())
    }

    pub(crate) fn effect_at_mut(&mut self, index: usize) -> Option<&mut TrackEffect> {
        self.effects.get_mut(index)
    }

    pub(crate) fn push(&mut self, effect: TrackEffect, node: OwnedNode) {
        self.effects.push(effect);
        self.nodes.push(node);
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> (TrackEffect, OwnedNode) {
        (self.effects.remove(index), self.nodes.remove(index))
    }

    /// Re-derive the signal path from scratch.
    ///
    /// Every downstream edge of the input and of each processing node is
    /// dropped, then `input -> enabled nodes in order -> output` is wired,
    /// or `input -> output` when nothing is enabled. The output's edge to
    /// the destination is never touched.
    pub(crate) fn rebuild(&self, graph: &mut AudioGraph) -> anyhow::Result<()> {
        graph.disconnect(self.input.id());
        for node in &self.nodes {
            graph.disconnect(node.id());
        }

        let enabled: Vec<NodeId> = self
            .effects
            .iter()
            .zip(&self.nodes)
            .filter(|(effect, _)| effect.enabled)
            .map(|(_, node)| node.id())
            .collect();

        let mut previous = self.input.id();
        for &node in &enabled {
            graph.connect(previous, node)?;
            previous = node;
        }
        graph.connect(previous, self.output.id())?;
        Ok(())
    }

    /// Follow the live edges from the input to the output
    pub fn signal_path(&self, graph: &AudioGraph) -> Vec<NodeId> {
        let mut path = vec![self.input.id()];
        let mut current = self.input.id();
        while current != self.output.id() {
            match graph.downstream(current).first() {
                Some(&next) if !path.contains(&next) => {
                    path.push(next);
                    current = next;
                }
                _ => break,
            }
        }
        path
    }

    /// Release every node the chain owns, boundaries included
    pub(crate) fn release(self, graph: &mut AudioGraph) {
        for node in self.nodes {
            node.release(graph);
        }
        self.input.release(graph);
        self.output.release(graph);
    }
}

impl fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectChain")
            .field("track", &self.track)
            .field("effects", &self.effects)
            .field("input", &self.input.id())
            .field("output", &self.output.id())
            .finish()
    }
}

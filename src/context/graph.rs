//! The audio node graph shared by sample playback and the effects engine
//!
//! Nodes live in a `StableDiGraph` so that a node's id stays valid while
//! other nodes come and go. Edges carry signal from upstream to downstream;
//! a node's input is the sum of everything connected into it. The graph is
//! kept acyclic (feedback lives inside nodes, never across edges), which lets
//! rendering walk a cached topological order once per sample.

use anyhow::{anyhow, bail};
use log::{debug, warn};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::nodes::{BufferSource, GainNode};
use crate::effects::{Effect, EffectNode};

/// Stable identity of a node within one graph
pub type NodeId = NodeIndex;

pub enum GraphNode {
    /// The single shared output sink
    Destination,
    /// Pass-through marker for a chain's entry or exit
    Boundary,
    Source(BufferSource),
    Gain(GainNode),
    Effect(EffectNode),
}

impl GraphNode {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        match self {
            GraphNode::Destination | GraphNode::Boundary => input,
            GraphNode::Source(source) => source.next_sample(),
            GraphNode::Gain(gain) => gain.process(input),
            GraphNode::Effect(effect) => effect.process(input),
        }
    }
}

/// A source/gain pair started by a trigger, removed once the source is done
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Voice {
    source: NodeId,
    gain: NodeId,
}

pub struct AudioGraph {
    graph: StableDiGraph<GraphNode, ()>,
    destination: NodeId,
    sample_rate: f32,
    frames_rendered: u64,

    /// Evaluation order, rebuilt lazily after any topology change
    order: Option<Vec<NodeId>>,
    /// Last output of every node, indexed by `NodeId::index()`
    outputs: Vec<f32>,

    voices: Vec<Voice>,
}

impl AudioGraph {
    pub fn new(sample_rate: f32) -> Self {
        let mut graph = StableDiGraph::new();
        let destination = graph.add_node(GraphNode::Destination);
        Self {
            graph,
            destination,
            sample_rate,
            frames_rendered: 0,
            order: None,
            outputs: Vec::new(),
            voices: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// The shared output sink every signal path ends in
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Number of frames rendered so far; this is the shared clock
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Clock position in seconds
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.graph.node_weight(id)
    }

    pub fn add_node(&mut self, node: GraphNode) -> NodeId {
        self.order = None;
        self.graph.add_node(node)
    }

    /// Remove a node together with every edge touching it.
    ///
    /// The destination cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> Option<GraphNode> {
        if id == self.destination {
            warn!("refusing to remove the destination node");
            return None;
        }
        self.order = None;
        self.voices.retain(|v| v.source != id && v.gain != id);
        self.graph.remove_node(id)
    }

    /// Connect `from`'s output into `to`'s input.
    ///
    /// Connecting an existing edge is a no-op. Fails when either node is
    /// missing or when the edge would close a cycle.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> anyhow::Result<()> {
        if !self.graph.contains_node(from) {
            bail!("cannot connect from missing node {:?}", from);
        }
        if !self.graph.contains_node(to) {
            bail!("cannot connect to missing node {:?}", to);
        }
        if self.graph.find_edge(from, to).is_some() {
            return Ok(());
        }
        if from == to || has_path_connecting(&self.graph, to, from, None) {
            bail!("connecting {:?} -> {:?} would create a cycle", from, to);
        }
        self.graph.add_edge(from, to, ());
        self.order = None;
        Ok(())
    }

    /// Drop every downstream connection of `from`; returns how many went
    pub fn disconnect(&mut self, from: NodeId) -> usize {
        let edges: Vec<_> = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in &edges {
            self.graph.remove_edge(*edge);
        }
        if !edges.is_empty() {
            self.order = None;
        }
        edges.len()
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.graph.find_edge(from, to).is_some()
    }

    pub fn downstream(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes: Vec<_> = self.graph.neighbors_directed(id, Direction::Outgoing).collect();
        nodes.sort();
        nodes
    }

    pub fn upstream(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes: Vec<_> = self.graph.neighbors_directed(id, Direction::Incoming).collect();
        nodes.sort();
        nodes
    }

    pub fn effect(&self, id: NodeId) -> Option<&EffectNode> {
        match self.graph.node_weight(id) {
            Some(GraphNode::Effect(effect)) => Some(effect),
            _ => None,
        }
    }

    pub fn effect_mut(&mut self, id: NodeId) -> Option<&mut EffectNode> {
        match self.graph.node_weight_mut(id) {
            Some(GraphNode::Effect(effect)) => Some(effect),
            _ => None,
        }
    }

    /// Start a source node and register it with its gain for reaping
    pub fn start_voice(&mut self, source: NodeId, gain: NodeId) -> anyhow::Result<()> {
        match self.graph.node_weight_mut(source) {
            Some(GraphNode::Source(node)) => node.start(),
            _ => return Err(anyhow!("node {:?} is not a buffer source", source)),
        }
        self.voices.push(Voice { source, gain });
        Ok(())
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Remove every voice whose source has played out
    pub fn reap_finished_voices(&mut self) -> usize {
        let finished: Vec<Voice> = self
            .voices
            .iter()
            .copied()
            .filter(|v| match self.graph.node_weight(v.source) {
                Some(GraphNode::Source(source)) => source.is_finished(),
                _ => true,
            })
            .collect();

        for voice in &finished {
            self.remove_node(voice.source);
            self.remove_node(voice.gain);
        }
        if !finished.is_empty() {
            debug!("reaped {} finished voice(s)", finished.len());
        }
        finished.len()
    }

    fn ensure_order(&mut self) {
        if self.order.is_some() {
            return;
        }
        let order = match toposort(&self.graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                // connect() refuses cycles, so this is a broken invariant
                warn!("audio graph has a cycle at {:?}; rendering silence", cycle.node_id());
                Vec::new()
            }
        };
        let bound = self.graph.node_indices().map(|i| i.index() + 1).max().unwrap_or(0);
        self.outputs.resize(bound, 0.0);
        self.order = Some(order);
    }

    /// Produce one frame at the destination and advance the clock
    pub fn tick(&mut self) -> f32 {
        self.ensure_order();
        let order = self.order.take().unwrap_or_default();

        for &id in &order {
            let input: f32 = self
                .graph
                .neighbors_directed(id, Direction::Incoming)
                .map(|up| self.outputs[up.index()])
                .sum();
            let output = match self.graph.node_weight_mut(id) {
                Some(node) => node.process(input),
                None => 0.0,
            };
            self.outputs[id.index()] = output;
        }

        self.order = Some(order);
        self.frames_rendered += 1;
        self.outputs.get(self.destination.index()).copied().unwrap_or(0.0)
    }

    /// Fill `out` with rendered frames, then reap voices that finished
    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.tick();
        }
        self.reap_finished_voices();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::SampleBuffer;
    use std::sync::Arc;

    #[test]
    fn test_connect_and_disconnect() {
        let mut graph = AudioGraph::new(44100.0);
        let a = graph.add_node(GraphNode::Boundary);
        let b = graph.add_node(GraphNode::Boundary);
        let dest = graph.destination();

        graph.connect(a, b).unwrap();
        graph.connect(a, dest).unwrap();
        graph.connect(a, b).unwrap();
        assert_eq!(graph.downstream(a).len(), 2);
        assert_eq!(graph.upstream(b), vec![a]);
        assert_eq!(graph.upstream(dest), vec![a]);

        assert_eq!(graph.disconnect(a), 2);
        assert!(graph.downstream(a).is_empty());
        assert!(graph.upstream(b).is_empty());
        assert_eq!(graph.disconnect(a), 0);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut graph = AudioGraph::new(44100.0);
        let a = graph.add_node(GraphNode::Boundary);
        let b = graph.add_node(GraphNode::Boundary);
        graph.connect(a, b).unwrap();
        assert!(graph.connect(b, a).is_err());
        assert!(graph.connect(a, a).is_err());
    }

    #[test]
    fn test_connect_to_removed_node_fails() {
        let mut graph = AudioGraph::new(44100.0);
        let a = graph.add_node(GraphNode::Boundary);
        let b = graph.add_node(GraphNode::Boundary);
        graph.remove_node(b);
        assert!(graph.connect(a, b).is_err());
    }

    #[test]
    fn test_destination_cannot_be_removed() {
        let mut graph = AudioGraph::new(44100.0);
        let dest = graph.destination();
        assert!(graph.remove_node(dest).is_none());
        assert!(graph.contains(dest));
    }

    #[test]
    fn test_inputs_are_summed() {
        let mut graph = AudioGraph::new(44100.0);
        let dest = graph.destination();
        for _ in 0..2 {
            let buffer = Arc::new(SampleBuffer::new(vec![0.25; 4], 44100.0));
            let source = graph.add_node(GraphNode::Source(BufferSource::new(buffer, 44100.0)));
            let gain = graph.add_node(GraphNode::Gain(GainNode::new(1.0)));
            graph.connect(source, gain).unwrap();
            graph.connect(gain, dest).unwrap();
            graph.start_voice(source, gain).unwrap();
        }
        assert_eq!(graph.tick(), 0.5);
        assert_eq!(graph.frames_rendered(), 1);
    }

    #[test]
    fn test_finished_voices_are_reaped() {
        let mut graph = AudioGraph::new(44100.0);
        let dest = graph.destination();
        let buffer = Arc::new(SampleBuffer::new(vec![1.0; 8], 44100.0));
        let source = graph.add_node(GraphNode::Source(BufferSource::new(buffer, 44100.0)));
        let gain = graph.add_node(GraphNode::Gain(GainNode::new(0.5)));
        graph.connect(source, gain).unwrap();
        graph.connect(gain, dest).unwrap();
        graph.start_voice(source, gain).unwrap();

        let mut out = vec![0.0; 16];
        graph.render(&mut out);

        assert_eq!(&out[..8], &[0.5; 8]);
        assert_eq!(&out[8..], &[0.0; 8]);
        assert_eq!(graph.active_voices(), 0);
        assert!(!graph.contains(source));
        assert!(!graph.contains(gain));
        assert_eq!(graph.node_count(), 1);
    }
}

//! Shared audio context: one graph, one clock, one destination
//!
//! Sample playback and the effects engine both hold an `AudioContext` handle
//! to the same graph. Control-side code locks it for the duration of one
//! operation (a trigger, a chain rebuild), so the audio thread never renders
//! a half-applied change.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use log::warn;

pub mod graph;
pub mod nodes;

pub use self::graph::{AudioGraph, GraphNode, NodeId};
pub use self::nodes::{BufferSource, GainNode};

#[derive(Clone)]
pub struct AudioContext {
    graph: Arc<Mutex<AudioGraph>>,
    sample_rate: f32,
}

impl AudioContext {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            graph: Arc::new(Mutex::new(AudioGraph::new(sample_rate))),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Lock the graph for a control-side operation
    pub fn lock(&self) -> anyhow::Result<MutexGuard<'_, AudioGraph>> {
        self.graph
            .lock()
            .map_err(|_| anyhow!("audio graph lock poisoned"))
    }

    /// Add a node and take ownership of it through a releasing handle
    pub fn adopt(&self, graph: &mut AudioGraph, node: GraphNode) -> OwnedNode {
        let id = graph.add_node(node);
        OwnedNode {
            context: self.clone(),
            id,
            released: false,
        }
    }

    /// Clock position in seconds
    pub fn current_time(&self) -> f64 {
        self.lock().map(|g| g.current_time()).unwrap_or(0.0)
    }

    /// Render a block for the audio callback; a poisoned graph renders silence
    pub fn render(&self, out: &mut [f32]) {
        match self.graph.lock() {
            Ok(mut graph) => graph.render(out),
            Err(_) => out.fill(0.0),
        }
    }

    pub fn ptr_eq(&self, other: &AudioContext) -> bool {
        Arc::ptr_eq(&self.graph, &other.graph)
    }
}

/// A graph node with a single owner
///
/// The owner releases it with `release` while it already holds the graph
/// lock. A handle that is dropped without being released removes its node
/// through the context instead, so a node never outlives its owner.
pub struct OwnedNode {
    context: AudioContext,
    id: NodeId,
    released: bool,
}

impl OwnedNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Remove the node from `graph`, which must be this handle's graph
    pub fn release(mut self, graph: &mut AudioGraph) {
        graph.remove_node(self.id);
        self.released = true;
    }
}

impl Drop for OwnedNode {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.context.graph.lock() {
            Ok(mut graph) => {
                graph.remove_node(self.id);
            }
            Err(_) => warn!("leaking node {:?}: audio graph lock poisoned", self.id),
        }
    }
}

impl std::fmt::Debug for OwnedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedNode").field("id", &self.id).finish()
    }
}

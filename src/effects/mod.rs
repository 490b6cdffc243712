pub mod delay;
pub mod distortion;
pub mod factory;
pub mod filter;
pub mod params;
pub mod reverb;

pub use self::delay::FeedbackDelay;
pub use self::distortion::Distortion;
pub use self::factory::EffectFactory;
pub use self::filter::FilterCascade;
pub use self::params::*;
pub use self::reverb::Freeverb;

/// Trait that all per-track effect processors implement
/// Send is required because nodes are rendered on the audio thread
pub trait Effect: Send {
    /// Process a single audio sample through the effect
    fn process(&mut self, input: f32) -> f32;

    /// Clear internal state (delay lines, filter history)
    fn reset(&mut self);
}

/// A live processing node, one variant per effect kind
///
/// Dispatch is an exhaustive match on the variant everywhere, so a node can
/// only ever receive parameters of its own kind.
pub enum EffectNode {
    Reverb(Freeverb),
    Delay(FeedbackDelay),
    Distortion(Distortion),
    Filter(FilterCascade),
}

impl EffectNode {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectNode::Reverb(_) => EffectKind::Reverb,
            EffectNode::Delay(_) => EffectKind::Delay,
            EffectNode::Distortion(_) => EffectKind::Distortion,
            EffectNode::Filter(_) => EffectKind::Filter,
        }
    }

    /// The parameter state the node currently holds
    pub fn params(&self) -> EffectParams {
        match self {
            EffectNode::Reverb(node) => EffectParams::Reverb(node.params()),
            EffectNode::Delay(node) => EffectParams::Delay(node.params()),
            EffectNode::Distortion(node) => EffectParams::Distortion(node.params()),
            EffectNode::Filter(node) => EffectParams::Filter(node.params()),
        }
    }
}

impl Effect for EffectNode {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        match self {
            EffectNode::Reverb(node) => node.process(input),
            EffectNode::Delay(node) => node.process(input),
            EffectNode::Distortion(node) => node.process(input),
            EffectNode::Filter(node) => node.process(input),
        }
    }

    fn reset(&mut self) {
        match self {
            EffectNode::Reverb(node) => Effect::reset(node),
            EffectNode::Delay(node) => Effect::reset(node),
            EffectNode::Distortion(node) => node.reset(),
            EffectNode::Filter(node) => node.reset(),
        }
    }
}

//! Builds effect nodes from parameter sets and pushes updates onto live nodes

use anyhow::{bail, Context};

use crate::config::EffectsConfig;
use crate::effects::params::{EffectKind, EffectParams};
use crate::effects::{Distortion, EffectNode, FeedbackDelay, FilterCascade, Freeverb};

/// Upper bound on a single delay line, in samples (about 45s at 44.1kHz)
const MAX_DELAY_LINE_SAMPLES: usize = 1 << 21;

pub struct EffectFactory {
    sample_rate: f32,
    max_delay_seconds: f32,
}

impl EffectFactory {
    pub fn new(sample_rate: f32, config: &EffectsConfig) -> Self {
        Self {
            sample_rate,
            max_delay_seconds: config.max_delay_seconds,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Construct a node of `kind` with every field of `params` applied.
    ///
    /// Fails when the parameters belong to another kind, contain non-finite
    /// values, or the node cannot be sized for the current sample rate.
    pub fn create(&self, kind: EffectKind, params: &EffectParams) -> anyhow::Result<EffectNode> {
        if params.kind() != kind {
            bail!("cannot build a {} node from {} parameters", kind, params.kind());
        }
        params
            .validate()
            .with_context(|| format!("invalid initial parameters for {}", kind))?;
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            bail!("cannot build a {} node at sample rate {}", kind, self.sample_rate);
        }

        let node = match params.clamped() {
            EffectParams::Reverb(p) => EffectNode::Reverb(Freeverb::new(self.sample_rate, p)),
            EffectParams::Delay(p) => {
                let line = (self.sample_rate * self.max_delay_seconds) as usize;
                if !self.max_delay_seconds.is_finite() || line > MAX_DELAY_LINE_SAMPLES {
                    bail!(
                        "delay line of {}s at {}Hz exceeds the allocation limit",
                        self.max_delay_seconds,
                        self.sample_rate
                    );
                }
                EffectNode::Delay(FeedbackDelay::new(self.sample_rate, self.max_delay_seconds, p))
            }
            EffectParams::Distortion(p) => EffectNode::Distortion(Distortion::new(self.sample_rate, p)),
            EffectParams::Filter(p) => EffectNode::Filter(FilterCascade::new(self.sample_rate, p)),
        };
        Ok(node)
    }

    /// Push the full parameter set onto an existing node.
    ///
    /// Idempotent: applying the same set twice leaves the node as applying it
    /// once would. The reverb's `decay` lands on the node as
    /// `dampening = decay * 3000`; every other field maps one-to-one.
    pub fn apply_params(node: &mut EffectNode, params: &EffectParams) -> anyhow::Result<()> {
        params.validate()?;
        match (node, params.clamped()) {
            (EffectNode::Reverb(n), EffectParams::Reverb(p)) => n.set_params(&p),
            (EffectNode::Delay(n), EffectParams::Delay(p)) => n.set_params(&p),
            (EffectNode::Distortion(n), EffectParams::Distortion(p)) => n.set_params(&p),
            (EffectNode::Filter(n), EffectParams::Filter(p)) => n.set_params(&p),
            (node, params) => bail!(
                "cannot apply {} parameters to a {} node",
                params.kind(),
                node.kind()
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::params::{DelayParams, FilterParams, ReverbParams};

    fn factory() -> EffectFactory {
        EffectFactory::new(44100.0, &EffectsConfig::default())
    }

    #[test]
    fn test_create_applies_initial_params() {
        let params = EffectParams::Reverb(ReverbParams::new(0.4, 1.5, 0.3));
        let node = factory().create(EffectKind::Reverb, &params).unwrap();
        assert_eq!(node.kind(), EffectKind::Reverb);
        assert_eq!(node.params(), params);
        match node {
            EffectNode::Reverb(reverb) => assert_eq!(reverb.dampening(), 4500.0),
            _ => panic!("expected a reverb node"),
        }
    }

    #[test]
    fn test_create_every_kind_with_defaults() {
        let factory = factory();
        for kind in EffectKind::ALL {
            let node = factory.create(kind, &kind.default_params()).unwrap();
            assert_eq!(node.params(), kind.default_params());
        }
    }

    #[test]
    fn test_create_rejects_mismatched_kind() {
        let params = EffectParams::Delay(DelayParams::default());
        assert!(factory().create(EffectKind::Filter, &params).is_err());
    }

    #[test]
    fn test_create_rejects_non_finite() {
        let params = EffectParams::Filter(FilterParams {
            frequency: f32::INFINITY,
            ..FilterParams::default()
        });
        assert!(factory().create(EffectKind::Filter, &params).is_err());
    }

    #[test]
    fn test_create_rejects_oversized_delay_line() {
        let config = EffectsConfig::default().with_max_delay_seconds(3600.0);
        let factory = EffectFactory::new(44100.0, &config);
        let params = EffectKind::Delay.default_params();
        assert!(factory.create(EffectKind::Delay, &params).is_err());
    }

    #[test]
    fn test_apply_params_is_idempotent() {
        let mut node = factory()
            .create(EffectKind::Delay, &EffectKind::Delay.default_params())
            .unwrap();
        let params = EffectParams::Delay(DelayParams::new(0.5, 0.7, 0.2));

        EffectFactory::apply_params(&mut node, &params).unwrap();
        let once = node.params();
        EffectFactory::apply_params(&mut node, &params).unwrap();
        assert_eq!(node.params(), once);
        assert_eq!(once, params);
    }

    #[test]
    fn test_apply_params_rejects_other_kind() {
        let mut node = factory()
            .create(EffectKind::Filter, &EffectKind::Filter.default_params())
            .unwrap();
        let before = node.params();
        let result = EffectFactory::apply_params(&mut node, &EffectKind::Delay.default_params());
        assert!(result.is_err());
        assert_eq!(node.params(), before);
    }
}

//! Configuration for the player, the effects engine and the sequencer

/// Limits and probe range for the effects engine
#[derive(Clone, Debug, PartialEq)]
pub struct EffectsConfig {
    /// Maximum number of entries a single track chain accepts
    pub max_effects_per_chain: usize,
    /// Length of every delay line, in seconds
    pub max_delay_seconds: f32,
    /// The effects backend refuses to start below this rate
    pub min_sample_rate: f32,
    /// ...or above this one
    pub max_sample_rate: f32,
}

impl EffectsConfig {
    pub fn with_max_effects_per_chain(mut self, max: usize) -> Self {
        self.max_effects_per_chain = max;
        self
    }

    pub fn with_max_delay_seconds(mut self, seconds: f32) -> Self {
        self.max_delay_seconds = seconds;
        self
    }

    pub fn with_sample_rate_range(mut self, min: f32, max: f32) -> Self {
        self.min_sample_rate = min;
        self.max_sample_rate = max;
        self
    }
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            max_effects_per_chain: 8,
            max_delay_seconds: 1.0,
            min_sample_rate: 8000.0,
            max_sample_rate: 192000.0,
        }
    }
}

/// Top-level configuration for a `Player`
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    pub sample_rate: f32,
    /// When false the player never starts the effects backend and every
    /// trigger goes straight to the destination
    pub effects_enabled: bool,
    pub effects: EffectsConfig,
}

impl PlayerConfig {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn with_effects_enabled(mut self, enabled: bool) -> Self {
        self.effects_enabled = enabled;
        self
    }

    pub fn with_effects(mut self, effects: EffectsConfig) -> Self {
        self.effects = effects;
        self
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            effects_enabled: true,
            effects: EffectsConfig::default(),
        }
    }
}

/// Transport settings for the step sequencer
#[derive(Clone, Debug, PartialEq)]
pub struct SequencerConfig {
    pub bpm: f32,
    /// Steps per pattern loop
    pub steps: usize,
    /// 4 = sixteenth notes
    pub steps_per_beat: usize,
}

impl SequencerConfig {
    pub fn new(bpm: f32, steps: usize, steps_per_beat: usize) -> Self {
        Self {
            bpm: bpm.clamp(20.0, 400.0),
            steps: steps.max(1),
            steps_per_beat: steps_per_beat.max(1),
        }
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self::new(120.0, 16, 4)
    }
}

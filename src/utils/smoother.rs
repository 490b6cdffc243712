//! Parameter smoothing for click-free effect parameter changes
//!
//! Effect parameters are dragged from the UI while the chain is rendering.
//! Jumping straight to a new delay time or wet level produces a click, so the
//! nodes that care route their parameters through a one-pole smoother.

/// Default smoothing time in milliseconds
pub const DEFAULT_SMOOTH_TIME_MS: f32 = 15.0;

/// A smoothed parameter with range constraints
#[derive(Clone, Debug)]
pub struct SmoothedParam {
    /// Current smoothed value
    current: f32,
    /// Target value we're smoothing towards
    target: f32,
    /// Smoothing coefficient (0-1, higher = faster)
    coeff: f32,
    /// Whether we've reached the target
    settled: bool,
    /// Minimum allowed value
    pub min: f32,
    /// Maximum allowed value
    pub max: f32,
}

impl SmoothedParam {
    /// Create a new smoothed parameter with range
    ///
    /// # Arguments
    /// * `initial_value` - Starting value (will be clamped to range)
    /// * `min` - Minimum allowed value
    /// * `max` - Maximum allowed value
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `smooth_time_ms` - Smoothing time in milliseconds (5-50ms typical)
    pub fn new(initial_value: f32, min: f32, max: f32, sample_rate: f32, smooth_time_ms: f32) -> Self {
        let clamped = initial_value.clamp(min, max);
        Self {
            current: clamped,
            target: clamped,
            coeff: Self::calculate_coeff(sample_rate, smooth_time_ms),
            settled: true,
            min,
            max,
        }
    }

    /// Create a 0-1 normalized parameter (wet levels, amounts)
    pub fn new_normalized(initial_value: f32, sample_rate: f32) -> Self {
        Self::new(initial_value, 0.0, 1.0, sample_rate, DEFAULT_SMOOTH_TIME_MS)
    }

    fn calculate_coeff(sample_rate: f32, smooth_time_ms: f32) -> f32 {
        if smooth_time_ms <= 0.0 {
            return 1.0;
        }
        let smooth_time_samples = (smooth_time_ms / 1000.0) * sample_rate;
        // coeff = 1 - e^(-1/tau), tau in samples
        1.0 - (-1.0 / smooth_time_samples).exp()
    }

    /// Set a new target value to smooth towards (clamped to range)
    pub fn set_target(&mut self, target: f32) {
        let clamped = target.clamp(self.min, self.max);
        if (self.target - clamped).abs() > 1e-8 {
            self.target = clamped;
            self.settled = false;
        }
    }

    /// Process one sample, returning the smoothed value
    #[inline]
    pub fn tick(&mut self) -> f32 {
        if self.settled {
            return self.current;
        }

        let next = self.current + self.coeff * (self.target - self.current);

        // Slow smoothers stall short of the target once the step drops
        // below f32 resolution
        if next == self.current || (next - self.target).abs() < 1e-6 {
            self.current = self.target;
            self.settled = true;
        } else {
            self.current = next;
        }

        self.current
    }

    /// Get the current smoothed value without advancing
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Get the target value
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Check if the smoother has reached its target
    pub fn is_settled(&self) -> bool {
        self.settled
    }
}

//! Filters for noisy wire measurements.

/// An averaging filter with an adaptive confidence range.
///
/// Values inside the confidence range shrink it toward the observed
/// magnitude; values outside double it and are clamped to its edge. The
/// effect is that a steady measurement tightens the band until outliers
/// barely move the output, while a genuine change in the input level
/// reopens the band within a few updates.
///
/// # Test
///
/// ```
/// use ravennakit_service::filter::BasicFilter;
///
/// let mut filter = BasicFilter::new(0.1);
///
/// // An outlier beyond the initial 1.0s range doubles the range and is
/// // clamped to it before the gain is applied.
/// let out = filter.update(5.0);
/// assert_eq!(out, 0.2);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BasicFilter {
    confidence_range: f64, // In seconds
    gain: f64,
}

impl BasicFilter {
    pub fn new(gain: f64) -> Self {
        Self {
            confidence_range: 1.0,
            gain,
        }
    }

    /// Updates the filter with a new value and returns the filtered
    /// value.
    pub fn update(&mut self, value: f64) -> f64 {
        let mut value = value;
        let value_abs = value.abs();
        if value_abs > self.confidence_range {
            self.confidence_range *= 2.0;
            value = value.clamp(-self.confidence_range, self.confidence_range);
        } else {
            self.confidence_range -= (self.confidence_range - value_abs) * self.gain;
        }
        value * self.gain
    }

    /// Resets the filter to its initial confidence range.
    pub fn reset(&mut self) {
        self.confidence_range = 1.0;
    }
}

const MIN_STEP_SIZE: f64 = 0.00001;
const MAX_STEP_SIZE: f64 = 100_000.0;

/// Keeps track of an EMA with outliers filtered out and a max deviation.
///
/// Each update moves the estimate by at most the current step size.
/// Consecutive clipped updates double the step size (the input really
/// moved), unclipped updates halve it back down. The step adaptation is
/// deliberately asymmetric and does not decay toward the raw EMA on
/// quiet intervals; the residual bias is accepted.
#[derive(Debug, Clone, Copy)]
pub struct IntervalStats {
    /// Interval as measured over time.
    pub interval: f64,
    /// The max deviation compared to interval.
    pub max_deviation: f64,
    /// Whether this struct has been initialized.
    pub initialized: bool,
    /// The alpha of the EMA calculation. Lower is smoother.
    pub alpha: f64,
    current_step_size: f64,
}

impl Default for IntervalStats {
    fn default() -> Self {
        Self {
            interval: 0.0,
            max_deviation: 0.0,
            initialized: false,
            alpha: 0.001,
            current_step_size: MIN_STEP_SIZE,
        }
    }
}

impl IntervalStats {
    pub fn update(&mut self, interval_ms: f64) {
        if !self.initialized {
            self.interval = interval_ms;
            self.initialized = true;
            return;
        }

        let ema = self.alpha * interval_ms + (1.0 - self.alpha) * self.interval;
        let step = ema - self.interval;

        if step > self.current_step_size {
            self.interval += self.current_step_size; // Limit positive change
            self.current_step_size = (self.current_step_size * 2.0).min(MAX_STEP_SIZE);
        } else if step < -self.current_step_size {
            self.interval -= self.current_step_size; // Limit negative change
            self.current_step_size = (self.current_step_size * 2.0).min(MAX_STEP_SIZE);
        } else {
            self.interval = ema; // Change is within limit
            self.current_step_size = (self.current_step_size / 2.0).max(MIN_STEP_SIZE);
        }

        self.max_deviation = (interval_ms - self.interval).abs().max(self.max_deviation);
    }

    pub fn reset(&mut self) {
        *self = Self {
            alpha: self.alpha,
            ..Self::default()
        };
    }
}

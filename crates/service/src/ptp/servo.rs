use crate::filter::BasicFilter;
use crate::ptp::stats::OFFSET_WINDOW;
use crate::sliding::SlidingStats;

/// The default proportional gain applied to filtered offsets.
pub const DEFAULT_GAIN: f64 = 0.1;

/// Offsets above this magnitude step the clock instead of slewing it.
pub const DEFAULT_STEP_THRESHOLD_NS: i64 = 1_000_000_000;

/// The servo reports calibrated once a full measurement window stayed
/// within this offset magnitude.
pub const DEFAULT_CALIBRATED_THRESHOLD_NS: i64 = 1_800_000;

/// The result of feeding one sync measurement through the servo.
#[derive(Debug, Clone, Copy)]
pub struct ServoOutput {
    /// The measured offset before filtering, in nanoseconds. Positive
    /// means the corrected local clock is ahead of the master.
    pub raw_offset_ns: i64,
    /// The offset after the outlier filter, in nanoseconds.
    pub filtered_offset_ns: i64,
    /// The accumulated correction register, in nanoseconds.
    pub correction_ns: i64,
    /// Whether this measurement stepped the clock.
    pub stepped: bool,
    /// Whether the servo currently considers itself calibrated.
    pub calibrated: bool,
}

/// The clock servo: turns `(t1, t2)` sync measurements into a correction
/// that is added to the local clock.
///
/// Small offsets are slewed away with a proportional gain; an offset
/// beyond the step threshold jumps the correction register in one go and
/// restarts calibration. Calibrated means a full window of consecutive
/// filtered offsets stayed within the calibration threshold.
#[derive(Debug, Clone)]
pub struct Servo {
    filter: BasicFilter,
    window: SlidingStats,
    step_threshold_ns: i64,
    calibrated_threshold_ns: i64,
    correction_ns: i64,
    calibrated: bool,
}

impl Servo {
    pub fn new(gain: f64, step_threshold_ns: i64, calibrated_threshold_ns: i64) -> Self {
        Self {
            filter: BasicFilter::new(gain),
            window: SlidingStats::new(OFFSET_WINDOW),
            step_threshold_ns,
            calibrated_threshold_ns,
            correction_ns: 0,
            calibrated: false,
        }
    }

    /// Feeds one sync measurement: the master transmit time `t1`, the
    /// local receive time `t2` and the current mean path delay estimate,
    /// all in nanoseconds.
    pub fn process(&mut self, t1_ns: i64, t2_ns: i64, mean_path_delay_ns: i64) -> ServoOutput {
        // Measure against the corrected local clock so the loop settles
        // at a zero residual offset.
        let raw_offset_ns = (t2_ns + self.correction_ns - t1_ns) - mean_path_delay_ns;

        if raw_offset_ns.abs() > self.step_threshold_ns {
            // Step: jump the register by the whole offset and restart
            // calibration from scratch.
            self.correction_ns -= raw_offset_ns;
            self.filter.reset();
            self.window.reset();
            self.calibrated = false;

            return ServoOutput {
                raw_offset_ns,
                filtered_offset_ns: raw_offset_ns,
                correction_ns: self.correction_ns,
                stepped: true,
                calibrated: false,
            };
        }

        // Slew: the filter output already carries the proportional gain.
        let filtered_seconds = self.filter.update(raw_offset_ns as f64 / 1e9);
        let filtered_offset_ns = (filtered_seconds * 1e9) as i64;
        self.correction_ns -= filtered_offset_ns;

        // Calibration judges the filtered offset: a full window of
        // consecutive in-threshold measurements.
        self.window.add(filtered_seconds);
        let threshold = self.calibrated_threshold_ns as f64 / 1e9;
        self.calibrated =
            self.window.full() && self.window.max() < threshold && self.window.min() > -threshold;

        ServoOutput {
            raw_offset_ns,
            filtered_offset_ns,
            correction_ns: self.correction_ns,
            stepped: false,
            calibrated: self.calibrated,
        }
    }

    pub fn correction_ns(&self) -> i64 {
        self.correction_ns
    }

    pub fn calibrated(&self) -> bool {
        self.calibrated
    }

    /// Resets the servo to its initial state, keeping the configuration.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.window.reset();
        self.correction_ns = 0;
        self.calibrated = false;
    }
}

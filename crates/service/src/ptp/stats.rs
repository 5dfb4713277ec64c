use crate::sliding::SlidingStats;

/// The number of measurements kept for offset statistics. Also the
/// number of consecutive in-threshold syncs needed before the port
/// reports itself calibrated.
pub const OFFSET_WINDOW: usize = 51;

/// Measurement statistics of a PTP port.
#[derive(Debug, Clone)]
pub struct Stats {
    /// Raw offset-from-master samples in seconds.
    pub offset_from_master: SlidingStats,
    /// Offset samples after the servo filter, in seconds.
    pub filtered_offset: SlidingStats,
    /// Announces dropped because their sequence id was older than the
    /// newest one seen from the same master.
    pub out_of_order_announces: u32,
    /// Syncs from a master other than the current best, or received
    /// before any master was selected.
    pub rejected_syncs: u32,
    /// Two-step syncs that were replaced by a newer sync before their
    /// follow-up arrived.
    pub sync_missed: u32,
    /// Follow-ups whose sequence id did not match the pending sync.
    pub follow_up_mismatches: u32,
    /// Measurements discarded by the servo because the clock stepped.
    pub ignored_outliers: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            offset_from_master: SlidingStats::new(OFFSET_WINDOW),
            filtered_offset: SlidingStats::new(OFFSET_WINDOW),
            out_of_order_announces: 0,
            rejected_syncs: 0,
            sync_missed: 0,
            follow_up_mismatches: 0,
            ignored_outliers: 0,
        }
    }
}

impl Stats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use codec::ptp::ClockIdentity;

/// The synchronized clock state published by a PTP port.
///
/// Single writer (the port, on the network loop), many readers (audio
/// and telemetry threads). Every field is an atomic word; the writer
/// publishes with release ordering so a reader that observes a fresh
/// `last_sync_unix_ns` also observes the matching offset.
#[derive(Debug, Default)]
pub struct ClockState {
    /// Correction to add to the local clock to obtain master time, in
    /// nanoseconds.
    offset_ns: AtomicI64,
    /// The current mean path delay estimate in nanoseconds.
    mean_path_delay_ns: AtomicI64,
    /// Whether the servo has converged within the calibration threshold.
    calibrated: AtomicBool,
    /// The grandmaster identity as a big-endian u64, 0 when no master is
    /// selected.
    grandmaster: AtomicU64,
    /// Local receive time of the most recent applied sync.
    last_sync_unix_ns: AtomicI64,
}

impl ClockState {
    pub fn offset_ns(&self) -> i64 {
        self.offset_ns.load(Ordering::Acquire)
    }

    pub fn mean_path_delay_ns(&self) -> i64 {
        self.mean_path_delay_ns.load(Ordering::Acquire)
    }

    pub fn calibrated(&self) -> bool {
        self.calibrated.load(Ordering::Acquire)
    }

    pub fn grandmaster_identity(&self) -> Option<ClockIdentity> {
        match self.grandmaster.load(Ordering::Acquire) {
            0 => None,
            raw => Some(ClockIdentity::from_u64(raw)),
        }
    }

    pub fn last_sync_unix_ns(&self) -> i64 {
        self.last_sync_unix_ns.load(Ordering::Acquire)
    }

    pub(crate) fn set_offset_ns(&self, value: i64) {
        self.offset_ns.store(value, Ordering::Release);
    }

    pub(crate) fn set_mean_path_delay_ns(&self, value: i64) {
        self.mean_path_delay_ns.store(value, Ordering::Release);
    }

    pub(crate) fn set_calibrated(&self, value: bool) {
        self.calibrated.store(value, Ordering::Release);
    }

    pub(crate) fn set_grandmaster(&self, identity: Option<ClockIdentity>) {
        let raw = identity.map_or(0, |id| id.as_u64());
        self.grandmaster.store(raw, Ordering::Release);
    }

    pub(crate) fn set_last_sync_unix_ns(&self, value: i64) {
        self.last_sync_unix_ns.store(value, Ordering::Release);
    }

    /// The local wall clock in unix nanoseconds, uncorrected.
    pub fn local_unix_ns() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }

    /// The current master time estimate in unix nanoseconds: the local
    /// clock plus the published correction.
    pub fn now_unix_ns(&self) -> i64 {
        Self::local_unix_ns() + self.offset_ns()
    }

    /// The synchronized media clock as a wrapping RTP timestamp for the
    /// given sample rate.
    pub fn rtp_timestamp(&self, sample_rate: u32) -> u32 {
        let now = self.now_unix_ns() as i128;
        ((now * sample_rate as i128) / 1_000_000_000) as u32
    }
}

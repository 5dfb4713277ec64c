//! ## RAVENNA node core
//!
//! The sans-IO heart of a RAVENNA / AES67 receiver: the PTP
//! ordinary-clock slave, the RTP receive pipeline and the statistics
//! kernels both are built from. Nothing in this crate opens a socket or
//! arms a timer; the runtime feeds decoded messages and receipt
//! timestamps in and executes the returned actions, which keeps every
//! state transition reproducible in tests.

pub mod average;
pub mod discovery;
pub mod filter;
pub mod ptp;
pub mod rtcp;
pub mod rtp;
pub mod sliding;
pub mod throttle;
pub mod wrapping;

use discovery::ServiceDescription;

/// Receives node events from the core. All methods have no-op defaults;
/// implementors pick what they care about.
///
/// The runtime invokes these on its own loop after the core released its
/// locks, so implementations may call back into the node but should not
/// block.
pub trait NodeObserver: Send + Sync {
    /// The PTP port changed state.
    #[allow(unused_variables)]
    fn ptp_state_changed(&self, state: ptp::State) {}

    /// The PTP servo crossed the calibration threshold in either
    /// direction.
    ///
    /// Calibrated means a full measurement window of filtered offsets
    /// stayed within the configured threshold; the synchronized media
    /// clock is usable for sample-accurate playback.
    #[allow(unused_variables)]
    fn ptp_calibrated_changed(&self, calibrated: bool) {}

    /// The best-master selection changed, including to `None` when the
    /// announce receipt timer expired.
    #[allow(unused_variables)]
    fn ptp_best_master_changed(&self, identity: Option<codec::ptp::PortIdentity>) {}

    /// A receive stream's packet counters changed. Throttled by the
    /// telemetry interval, and additionally delivered whenever a packet
    /// was reclassified (a late arrival recovering a dropped packet
    /// notifies even if the totals look bland).
    #[allow(unused_variables)]
    fn rtp_stream_stats_updated(&self, stream: &str, counters: &rtp::Counters) {}

    /// A service appeared on the network.
    #[allow(unused_variables)]
    fn service_discovered(&self, description: &ServiceDescription) {}

    /// A service was resolved to a host, port and TXT record.
    #[allow(unused_variables)]
    fn service_resolved(&self, description: &ServiceDescription) {}

    /// A service disappeared from the network.
    #[allow(unused_variables)]
    fn service_removed(&self, description: &ServiceDescription) {}
}

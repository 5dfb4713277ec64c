//! RTCP reception state: remembers peer sender reports and assembles the
//! reception report blocks of outbound sender reports. From RFC 3550
//! Section 6.4 and Appendix A.3.

use crate::wrapping::Wrapping16;

use ahash::{HashMap, HashMapExt};
use codec::{ntp, rtcp::ReportBlock};

/// The last sender report received from a peer SSRC, kept so outbound
/// report blocks can carry the NTP correlation and our own future
/// receiver reports can reference it.
#[derive(Debug, Clone, Copy)]
pub struct PeerSenderReport {
    pub ntp_timestamp: ntp::Timestamp,
    pub rtp_timestamp: u32,
    /// Local wall clock when the report arrived.
    pub received_unix_ns: i64,
}

/// Records the most recent sender report per peer SSRC.
#[derive(Debug, Default)]
pub struct PeerReports {
    reports: HashMap<u32, PeerSenderReport>,
}

impl PeerReports {
    pub fn new() -> Self {
        Self {
            reports: HashMap::with_capacity(16),
        }
    }

    pub fn record(&mut self, ssrc: u32, report: PeerSenderReport) {
        self.reports.insert(ssrc, report);
    }

    pub fn get(&self, ssrc: u32) -> Option<&PeerSenderReport> {
        self.reports.get(&ssrc)
    }

    pub fn remove(&mut self, ssrc: u32) {
        self.reports.remove(&ssrc);
    }
}

/// Per-source reception accounting for outbound report blocks: extended
/// highest sequence number, cumulative and interval loss.
///
/// # Test
///
/// ```
/// use ravennakit_service::rtcp::ReceptionState;
///
/// let mut state = ReceptionState::default();
///
/// for seq in [100u16, 101, 103, 104] {
///     state.packet_received(seq);
/// }
///
/// assert_eq!(state.extended_highest_sequence_number(), 104);
/// assert_eq!(state.cumulative_lost(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct ReceptionState {
    first_sequence_number: Option<u16>,
    highest: Option<Wrapping16>,
    /// The number of times the sequence number wrapped.
    cycles: u32,
    received: u64,
    expected_prior: u64,
    received_prior: u64,
}

impl ReceptionState {
    pub fn packet_received(&mut self, sequence_number: u16) {
        self.received += 1;

        let Some(highest) = &mut self.highest else {
            self.first_sequence_number = Some(sequence_number);
            self.highest = Some(Wrapping16::new(sequence_number));
            return;
        };

        let before = highest.value();
        if highest.update(sequence_number).is_some() && sequence_number < before {
            self.cycles += 1;
        }
    }

    /// Wrap cycles in the high 16 bits, the highest sequence number seen
    /// in the low 16.
    pub fn extended_highest_sequence_number(&self) -> u32 {
        let highest = self.highest.map_or(0, |h| h.value());
        self.cycles << 16 | highest as u32
    }

    /// The number of packets expected so far, from the first to the
    /// extended highest sequence number.
    pub fn expected(&self) -> u64 {
        let Some(first) = self.first_sequence_number else {
            return 0;
        };

        let ext_first = first as u64;
        let ext_highest = self.extended_highest_sequence_number() as u64;
        ext_highest.saturating_sub(ext_first) + 1
    }

    pub fn cumulative_lost(&self) -> u32 {
        self.expected().saturating_sub(self.received) as u32
    }

    /// Builds the reception report block for this source, consuming the
    /// current reporting interval. `jitter` comes from the interarrival
    /// estimator, `last_sr` from the peer report table.
    pub fn make_report_block(
        &mut self,
        ssrc: u32,
        jitter: u32,
        last_sr: Option<&PeerSenderReport>,
        now_unix_ns: i64,
    ) -> ReportBlock {
        let expected = self.expected();
        let expected_interval = expected.saturating_sub(self.expected_prior);
        let received_interval = self.received.saturating_sub(self.received_prior);
        self.expected_prior = expected;
        self.received_prior = self.received;

        let lost_interval = expected_interval.saturating_sub(received_interval);
        let fraction_lost = if expected_interval == 0 {
            0
        } else {
            ((lost_interval << 8) / expected_interval).min(255) as u8
        };

        let (last_sr_timestamp, delay_since_last_sr) = match last_sr {
            Some(report) => {
                let delay_ns = (now_unix_ns - report.received_unix_ns).max(0);
                let delay = (delay_ns as u128 * 65536 / 1_000_000_000) as u32;
                (report.ntp_timestamp.compact(), delay)
            }
            None => (0, 0),
        };

        ReportBlock {
            ssrc,
            fraction_lost,
            cumulative_lost: self.cumulative_lost(),
            extended_highest_sequence_number: self.extended_highest_sequence_number(),
            interarrival_jitter: jitter,
            last_sr_timestamp,
            delay_since_last_sr,
        }
    }
}

use crate::wrapping::Wrapping16;

/// The dropped-pending list never grows beyond half the sequence number
/// range; beyond that a "late" packet is indistinguishable from a future
/// one anyway.
const MAX_PENDING_DROPPED: usize = 1 << 15;

/// Reception counters of one RTP stream.
#[derive(Debug, Default, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Counters {
    /// The number of packets which arrived out of order, not including
    /// duplicate packets.
    pub out_of_order: u32,
    /// The number of packets which were duplicates.
    pub duplicates: u32,
    /// The number of packets which were dropped.
    pub dropped: u32,
    /// The number of packets which were too late for the consumer.
    pub too_late: u32,
    /// The number of pending dropped entries evicted because the list
    /// was full.
    pub pending_overflow: u32,
    /// Smoothed interarrival jitter in timestamp units. Not maintained
    /// by this class, but can be filled in externally.
    pub jitter: f64,
}

impl PartialEq for Counters {
    fn eq(&self, other: &Self) -> bool {
        // Jitter is a derived float and deliberately excluded.
        (self.out_of_order, self.too_late, self.duplicates, self.dropped)
            == (other.out_of_order, other.too_late, other.duplicates, other.dropped)
    }
}

impl std::ops::Add for Counters {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            out_of_order: self.out_of_order + other.out_of_order,
            duplicates: self.duplicates + other.duplicates,
            dropped: self.dropped + other.dropped,
            too_late: self.too_late + other.too_late,
            pending_overflow: self.pending_overflow + other.pending_overflow,
            jitter: self.jitter,
        }
    }
}

impl std::fmt::Display for Counters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "out_of_order: {}, duplicates: {}, dropped: {}, too_late: {}, jitter: {}",
            self.out_of_order, self.duplicates, self.dropped, self.too_late, self.jitter
        )
    }
}

/// Sequence number accounting for an RTP stream.
///
/// A gap in the sequence numbers counts the missing packets as dropped
/// and remembers them in a pending list, so that a late arrival can be
/// reclassified from dropped to out-of-order without losing
/// monotonicity. `update` returns the totals snapshot whenever they
/// changed in a way subscribers care about; note that any out-of-order
/// arrival notifies, even when no pending drop was left to reclaim.
///
/// # Test
///
/// ```
/// use ravennakit_service::rtp::PacketStats;
///
/// let mut stats = PacketStats::default();
///
/// assert!(stats.update(100).is_none());
/// assert!(stats.update(102).is_some()); // 101 is missing
/// assert_eq!(stats.totals().dropped, 1);
///
/// let counters = stats.update(101).unwrap(); // late arrival
/// assert_eq!(counters.dropped, 0);
/// assert_eq!(counters.out_of_order, 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct PacketStats {
    most_recent_sequence_number: Option<Wrapping16>,
    totals: Counters,
    dirty: bool,
    dropped_packets: Vec<u16>,
}

impl PacketStats {
    /// Updates the statistics with the sequence number of an incoming
    /// packet. Returns the total counts if changed.
    pub fn update(&mut self, sequence_number: u16) -> Option<Counters> {
        let packet_sequence_number = Wrapping16::new(sequence_number);

        let Some(mut most_recent) = self.most_recent_sequence_number else {
            self.most_recent_sequence_number = Some(packet_sequence_number);
            return None;
        };

        if packet_sequence_number <= most_recent {
            if self.remove_dropped(sequence_number) {
                self.totals.dropped -= 1;
                self.totals.out_of_order += 1;
            } else {
                self.totals.duplicates += 1;
            }
            self.dirty = false;
            return Some(self.totals);
        }

        if let Some(diff) = most_recent.update(sequence_number) {
            self.most_recent_sequence_number = Some(most_recent);
            self.clear_outdated_dropped_packets();

            for i in 1..diff {
                self.totals.dropped += 1;
                if self.dropped_packets.len() == MAX_PENDING_DROPPED {
                    self.dropped_packets.remove(0);
                    self.totals.pending_overflow += 1;
                }
                self.dropped_packets.push(sequence_number.wrapping_sub(i));
                self.dirty = true;
            }

            if self.dirty {
                self.dirty = false;
                return Some(self.totals);
            }
        }

        // mark_packet_too_late might have set the dirty flag.
        if std::mem::take(&mut self.dirty) {
            return Some(self.totals);
        }

        None
    }

    /// Marks a packet as too late, meaning it didn't arrive in time for
    /// the consumer. The notification is batched into the next `update`.
    pub fn mark_packet_too_late(&mut self, sequence_number: u16) {
        let Some(most_recent) = self.most_recent_sequence_number else {
            return; // Can't mark a packet too late which never arrived
        };

        if Wrapping16::new(sequence_number) > most_recent {
            return; // Newer, or older than half the sequence range
        }

        self.totals.too_late += 1;
        self.dirty = true;
    }

    /// The total counts collected so far.
    pub fn totals(&self) -> Counters {
        self.totals
    }

    /// Resets to the initial state.
    pub fn reset(&mut self) {
        self.most_recent_sequence_number = None;
        self.totals = Counters::default();
        self.dirty = false;
        self.dropped_packets.clear();
    }

    fn remove_dropped(&mut self, sequence_number: u16) -> bool {
        for i in 0..self.dropped_packets.len() {
            if self.dropped_packets[i] == sequence_number {
                self.dropped_packets.swap_remove(i);
                return true;
            }
        }

        false
    }

    /// Purges pending entries that have wrapped past the most recent
    /// sequence number: once an entry compares newer than the newest
    /// packet it can never be matched by a late arrival again.
    fn clear_outdated_dropped_packets(&mut self) {
        let Some(most_recent) = self.most_recent_sequence_number else {
            return;
        };

        self.dropped_packets
            .retain(|seq| Wrapping16::new(*seq) <= most_recent);
    }
}

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use ahash::AHashMap;
use parking_lot::RwLock;

/// The type of information passed in the statistics channel.
#[derive(Debug, Clone, Copy)]
pub enum Stats {
    ReceivedBytes(u64),
    ReceivedPkts(u64),
    /// Datagrams that failed RTP validation.
    InvalidPkts(u64),
    /// Valid packets rejected by the SSRC or source filter.
    RejectedPkts(u64),
    /// RTCP packets ingested on the stream's control port.
    RtcpPkts(u64),
}

pub trait Number {
    fn add(&self, value: u64);
    fn get(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct Count(AtomicU64);

impl Number for Count {
    fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Worker independent per-stream counters.
#[derive(Debug, Default)]
pub struct Counts<T> {
    pub received_bytes: T,
    pub received_pkts: T,
    pub invalid_pkts: T,
    pub rejected_pkts: T,
    pub rtcp_pkts: T,
}

impl<T: Number> Counts<T> {
    /// # Example
    ///
    /// ```
    /// use ravennakit::statistics::*;
    ///
    /// let counts = Counts::<Count>::default();
    ///
    /// counts.add(&Stats::ReceivedBytes(100));
    /// assert_eq!(counts.received_bytes.get(), 100);
    ///
    /// counts.add(&Stats::ReceivedPkts(1));
    /// assert_eq!(counts.received_pkts.get(), 1);
    /// ```
    pub fn add(&self, payload: &Stats) {
        match payload {
            Stats::ReceivedBytes(v) => self.received_bytes.add(*v),
            Stats::ReceivedPkts(v) => self.received_pkts.add(*v),
            Stats::InvalidPkts(v) => self.invalid_pkts.add(*v),
            Stats::RejectedPkts(v) => self.rejected_pkts.add(*v),
            Stats::RtcpPkts(v) => self.rtcp_pkts.add(*v),
        }
    }
}

/// Per-stream reception statistics of the whole node, keyed by stream
/// name.
#[derive(Clone)]
pub struct Statistics(Arc<RwLock<AHashMap<String, Counts<Count>>>>);

impl Default for Statistics {
    fn default() -> Self {
        Self(Arc::new(RwLock::new(AHashMap::with_capacity(16))))
    }
}

impl Statistics {
    /// Get a reporter handle for the socket workers.
    ///
    /// # Example
    ///
    /// ```
    /// use ravennakit::statistics::*;
    ///
    /// let statistics = Statistics::default();
    /// statistics.register("studio-left");
    ///
    /// let reporter = statistics.get_reporter();
    /// reporter.send("studio-left", &[Stats::ReceivedPkts(1)]);
    ///
    /// assert_eq!(statistics.get("studio-left").unwrap().received_pkts, 1);
    /// ```
    pub fn get_reporter(&self) -> StatisticsReporter {
        StatisticsReporter(self.0.clone())
    }

    /// Add a stream to the watch list.
    pub fn register(&self, name: &str) {
        self.0.write().insert(name.to_string(), Counts::default());
    }

    /// Remove a stream from the watch list.
    pub fn unregister(&self, name: &str) {
        self.0.write().remove(name);
    }

    /// Snapshot the counters of one stream.
    pub fn get(&self, name: &str) -> Option<Counts<u64>> {
        self.0.read().get(name).map(|counts| Counts {
            received_bytes: counts.received_bytes.get(),
            received_pkts: counts.received_pkts.get(),
            invalid_pkts: counts.invalid_pkts.get(),
            rejected_pkts: counts.rejected_pkts.get(),
            rtcp_pkts: counts.rtcp_pkts.get(),
        })
    }

    /// The names of all registered streams.
    pub fn names(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }
}

/// Statistics reporter.
///
/// Held by each socket worker; counter updates go through this handle so
/// the workers never touch the registry lock for longer than a read.
#[derive(Clone)]
pub struct StatisticsReporter(Arc<RwLock<AHashMap<String, Counts<Count>>>>);

impl StatisticsReporter {
    pub fn send(&self, name: &str, reports: &[Stats]) {
        if let Some(counts) = self.0.read().get(name) {
            for item in reports {
                counts.add(item);
            }
        }
    }
}

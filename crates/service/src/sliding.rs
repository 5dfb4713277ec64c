//! Statistics over a sliding window of the last N samples.

use std::collections::VecDeque;

/// Mean, min, max and variance over the last `capacity` samples, with
/// every query answered in O(1) and `add` amortized O(1).
///
/// The window keeps a running sum and sum of squares, evicting the
/// contribution of samples that fall out of the window, plus two
/// monotonic deques whose front elements are the current minimum and
/// maximum.
///
/// # Test
///
/// ```
/// use ravennakit_service::sliding::SlidingStats;
///
/// let mut stats = SlidingStats::new(3);
///
/// stats.add(1.0);
/// stats.add(2.0);
/// stats.add(3.0);
/// stats.add(10.0); // evicts 1.0
///
/// assert_eq!(stats.count(), 3);
/// assert_eq!(stats.mean(), 5.0);
/// assert_eq!(stats.min(), 2.0);
/// assert_eq!(stats.max(), 10.0);
/// ```
#[derive(Debug, Clone)]
pub struct SlidingStats {
    capacity: usize,
    samples: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
    // Total number of samples ever added; used to expire deque entries.
    added: u64,
    min_deque: VecDeque<(u64, f64)>,
    max_deque: VecDeque<(u64, f64)>,
}

impl SlidingStats {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sliding window capacity must be non-zero");
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            sum: 0.0,
            sum_sq: 0.0,
            added: 0,
            min_deque: VecDeque::new(),
            max_deque: VecDeque::new(),
        }
    }

    /// Adds a new sample, evicting the oldest one once the window is
    /// full.
    pub fn add(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted;
                self.sum_sq -= evicted * evicted;
            }
        }

        self.samples.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;

        while self.min_deque.back().is_some_and(|(_, v)| *v >= value) {
            self.min_deque.pop_back();
        }
        self.min_deque.push_back((self.added, value));

        while self.max_deque.back().is_some_and(|(_, v)| *v <= value) {
            self.max_deque.pop_back();
        }
        self.max_deque.push_back((self.added, value));

        self.added += 1;

        // Expire tracker entries that have left the window.
        let lowest_live = self.added.saturating_sub(self.capacity as u64);
        while self.min_deque.front().is_some_and(|(i, _)| *i < lowest_live) {
            self.min_deque.pop_front();
        }
        while self.max_deque.front().is_some_and(|(i, _)| *i < lowest_live) {
            self.max_deque.pop_front();
        }
    }

    /// The number of samples currently in the window.
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window has reached its capacity.
    pub fn full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum / self.samples.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.min_deque.front().map_or(0.0, |(_, v)| *v)
    }

    pub fn max(&self) -> f64 {
        self.max_deque.front().map_or(0.0, |(_, v)| *v)
    }

    /// The population variance of the window. Long windows of large
    /// magnitudes accumulate floating point error in the running sum of
    /// squares, so a slightly negative result is clamped to zero.
    pub fn variance(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let count = self.samples.len() as f64;
        let mean = self.sum / count;
        (self.sum_sq / count - mean * mean).max(0.0)
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Resets the window to its initial empty state.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.min_deque.clear();
        self.max_deque.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.added = 0;
    }
}

//! Rate limiting for telemetry values.

use std::time::{Duration, Instant};

/// Holds the most recent value and only hands it out when at least the
/// configured interval has passed since the last hand-out. Used to keep
/// per-packet statistics updates from flooding subscribers.
///
/// # Test
///
/// ```
/// use std::time::Duration;
/// use ravennakit_service::throttle::Throttle;
///
/// let mut throttle = Throttle::new(Duration::from_secs(3600));
///
/// // The first value passes, updates inside the interval are held back.
/// assert_eq!(throttle.update(1), Some(1));
/// assert_eq!(throttle.update(2), None);
/// assert_eq!(throttle.get(), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    value: Option<T>,
    last_update: Option<Instant>,
    interval: Duration,
}

impl<T: Clone> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            value: None,
            last_update: None,
            interval,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Stores the value and returns it if the interval has passed since
    /// the last returned value, otherwise `None`.
    pub fn update(&mut self, value: T) -> Option<T> {
        self.value = Some(value);
        self.get_throttled()
    }

    /// The stored value, which might be empty if no value was set
    /// before.
    pub fn get(&self) -> Option<T> {
        self.value.clone()
    }

    /// The stored value if the interval has passed since the last
    /// hand-out, otherwise `None`. The last set value is returned even
    /// if it did not change since the previous call to `update`.
    pub fn get_throttled(&mut self) -> Option<T> {
        self.value.as_ref()?;

        let now = Instant::now();
        let due = match self.last_update {
            None => true,
            Some(last) => now > last + self.interval,
        };

        if due {
            self.last_update = Some(now);
            return self.value.clone();
        }

        None
    }

    /// Clears the stored value.
    pub fn clear(&mut self) {
        self.value = None;
    }
}

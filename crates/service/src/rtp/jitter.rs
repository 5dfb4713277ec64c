/// Interarrival jitter estimator. From RFC 3550 Section 6.4.1.
///
/// The jitter is the smoothed absolute difference of packet transit
/// times, in RTP timestamp units: `J += (|D| - J) / 16`. The arrival
/// time must be expressed in the same clock and units as the packet
/// timestamps, which a receiver derives from its synchronized media
/// clock.
///
/// # Test
///
/// ```
/// use ravennakit_service::rtp::InterarrivalJitter;
///
/// let mut jitter = InterarrivalJitter::default();
///
/// // Constant transit: no jitter.
/// jitter.update(1000, 0);
/// jitter.update(1480, 480);
/// assert_eq!(jitter.value(), 0.0);
///
/// // A packet 160 units late moves the estimate by 160/16.
/// jitter.update(2120, 960);
/// assert_eq!(jitter.value(), 10.0);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct InterarrivalJitter {
    last_transit: Option<i64>,
    jitter: f64,
}

impl InterarrivalJitter {
    /// Feeds one packet: the arrival time converted to RTP units and the
    /// timestamp from the packet header.
    pub fn update(&mut self, arrival_rtp: u32, packet_timestamp: u32) -> f64 {
        let transit = arrival_rtp.wrapping_sub(packet_timestamp) as i32 as i64;

        if let Some(last) = self.last_transit {
            let d = (transit - last).abs() as f64;
            self.jitter += (d - self.jitter) / 16.0;
        }

        self.last_transit = Some(transit);
        self.jitter
    }

    /// The current estimate in RTP timestamp units.
    pub fn value(&self) -> f64 {
        self.jitter
    }

    /// The estimate truncated to the integer form used in RTCP report
    /// blocks.
    pub fn as_report_value(&self) -> u32 {
        self.jitter as u32
    }

    pub fn reset(&mut self) {
        self.last_transit = None;
        self.jitter = 0.0;
    }
}

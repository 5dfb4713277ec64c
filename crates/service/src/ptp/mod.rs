//! The PTP ordinary-clock slave: best-master selection, sync pairing,
//! peer-delay measurement and the clock servo. The wire formats live in
//! the codec crate; everything here is sans-IO and driven by the caller
//! with decoded messages and local receipt timestamps.

mod clock;
mod port;
mod servo;
mod stats;

pub use clock::ClockState;
pub use port::{ForeignMaster, Port, PortAction, PortConfig, State};
pub use servo::{
    DEFAULT_CALIBRATED_THRESHOLD_NS, DEFAULT_GAIN, DEFAULT_STEP_THRESHOLD_NS, Servo, ServoOutput,
};
pub use stats::{OFFSET_WINDOW, Stats};

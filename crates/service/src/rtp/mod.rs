//! The RTP receive pipeline core: sequence accounting, the
//! timestamp-indexed jitter ring and the RFC 3550 jitter estimator.

mod jitter;
mod packet_stats;
mod ringbuffer;

pub use jitter::InterarrivalJitter;
pub use packet_stats::{Counters, PacketStats};
pub use ringbuffer::Ringbuffer;

//! PTPv2 (IEEE 1588-2008) message formats.
//!
//! Only the subset of the protocol a slave-only ordinary clock needs is
//! implemented: Announce, Sync, Follow_Up, Delay_Req/Delay_Resp and the
//! peer-delay family. Management and signaling messages are recognized by
//! type but have no body codec.

mod header;
mod messages;

pub use header::{FLAG_TWO_STEP, HEADER_SIZE, MessageHeader};
pub use messages::{
    Announce, DelayReq, DelayResp, FollowUp, PdelayReq, PdelayResp, PdelayRespFollowUp, Sync,
};

use crate::{Error, read_u16, read_u32};

use bytes::{BufMut, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// PTP event messages are sent to this port, general messages to
/// [`GENERAL_PORT`]. From IEEE 1588-2008 Annex D.
pub const EVENT_PORT: u16 = 319;
pub const GENERAL_PORT: u16 = 320;

/// The primary PTP multicast group for both event and general messages.
pub const PRIMARY_MULTICAST_ADDR: [u8; 4] = [224, 0, 1, 129];

/// The message type nibble from the first header byte.
/// From IEEE 1588-2008 Table 19. Values 0x4..=0x7, 0xE and 0xF are
/// reserved and rejected during header decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PdelayReq = 0x2,
    PdelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PdelayRespFollowUp = 0xA,
    Announce = 0xB,
    Signaling = 0xC,
    Management = 0xD,
}

impl MessageType {
    /// Whether the message is an event message, i.e. timestamped on
    /// receipt and carried on the event port.
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            Self::Sync | Self::DelayReq | Self::PdelayReq | Self::PdelayResp
        )
    }
}

/// Clock accuracy enumeration. From IEEE 1588-2008 Table 6; values
/// outside the specified range decode as `Unknown` which compares worst
/// in the best-master comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ClockAccuracy {
    Within25Ns = 0x20,
    Within100Ns = 0x21,
    Within250Ns = 0x22,
    Within1Us = 0x23,
    Within2_5Us = 0x24,
    Within10Us = 0x25,
    Within25Us = 0x26,
    Within100Us = 0x27,
    Within250Us = 0x28,
    Within1Ms = 0x29,
    Within2_5Ms = 0x2A,
    Within10Ms = 0x2B,
    Within25Ms = 0x2C,
    Within100Ms = 0x2D,
    Within250Ms = 0x2E,
    Within1S = 0x2F,
    Within10S = 0x30,
    Beyond10S = 0x31,
    #[num_enum(default)]
    Unknown = 0xFE,
}

/// Source of time used by the grandmaster. From IEEE 1588-2008 Table 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TimeSource {
    AtomicClock = 0x10,
    Gps = 0x20,
    TerrestrialRadio = 0x30,
    Ptp = 0x40,
    Ntp = 0x50,
    HandSet = 0x60,
    Other = 0x90,
    #[num_enum(default)]
    InternalOscillator = 0xA0,
}

/// An 8-byte clock identity, usually derived from the EUI-64 of the
/// interface the clock lives on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    pub const SIZE: usize = 8;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self(bytes.get(..Self::SIZE).ok_or(Error::InvalidMessageLength)?.try_into()?))
    }

    pub fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_slice(&self.0);
    }

    /// The identity as a single integer, useful for atomic publication.
    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }
}

impl std::fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}.{:02x}{:02x}.{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// A clock identity plus the number of the port on that clock. 10 bytes
/// on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortIdentity {
    pub clock_identity: ClockIdentity,
    pub port_number: u16,
}

impl PortIdentity {
    pub const SIZE: usize = 10;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < Self::SIZE {
            return Err(Error::InvalidMessageLength);
        }

        Ok(Self {
            clock_identity: ClockIdentity::from_bytes(bytes)?,
            port_number: read_u16(bytes, ClockIdentity::SIZE),
        })
    }

    pub fn write_to(&self, buffer: &mut BytesMut) {
        self.clock_identity.write_to(buffer);
        buffer.put_u16(self.port_number);
    }
}

impl std::fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.clock_identity, self.port_number)
    }
}

/// Grandmaster clock quality as advertised in Announce messages and
/// compared by the best-master-clock algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockQuality {
    pub class: u8,
    pub accuracy: ClockAccuracy,
    pub offset_scaled_log_variance: u16,
}

impl Default for ClockQuality {
    fn default() -> Self {
        Self {
            class: 248,
            accuracy: ClockAccuracy::Unknown,
            offset_scaled_log_variance: 0xFFFF,
        }
    }
}

impl std::fmt::Display for ClockQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "class={} accuracy={:?} variance={:#06x}",
            self.class, self.accuracy, self.offset_scaled_log_variance
        )
    }
}

/// A PTP timestamp: 48-bit seconds plus 32-bit nanoseconds, 10 bytes on
/// the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    seconds: u64,
    nanoseconds: u32,
}

impl Timestamp {
    pub const SIZE: usize = 10;

    pub fn new(seconds: u64, nanoseconds: u32) -> Self {
        Self {
            seconds: seconds & 0xFFFF_FFFF_FFFF,
            nanoseconds,
        }
    }

    /// # Test
    ///
    /// ```
    /// use ravennakit_codec::ptp::Timestamp;
    ///
    /// let buffer = [
    ///     0x00u8, 0x00, 0x65, 0x8D, 0x1E, 0x00, // seconds
    ///     0x1D, 0xCD, 0x65, 0x00, // nanoseconds
    /// ];
    ///
    /// let ts = Timestamp::from_bytes(&buffer).unwrap();
    ///
    /// assert_eq!(ts.seconds(), 1703747072);
    /// assert_eq!(ts.nanoseconds(), 500000000);
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < Self::SIZE {
            return Err(Error::InvalidMessageLength);
        }

        let seconds = u64::from_be_bytes([
            0, 0, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5],
        ]);

        Ok(Self {
            seconds,
            nanoseconds: read_u32(bytes, 6),
        })
    }

    pub fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_slice(&self.seconds.to_be_bytes()[2..8]);
        buffer.put_u32(self.nanoseconds);
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn nanoseconds(&self) -> u32 {
        self.nanoseconds
    }

    /// The timestamp as nanoseconds since the PTP epoch. Safe until the
    /// year 2262 which is beyond the reach of a 48-bit seconds field
    /// anyway.
    pub fn as_nanos(&self) -> i64 {
        self.seconds as i64 * 1_000_000_000 + self.nanoseconds as i64
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self {
            seconds: (nanos / 1_000_000_000) as u64,
            nanoseconds: (nanos % 1_000_000_000) as u32,
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

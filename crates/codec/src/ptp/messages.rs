use crate::{
    Error,
    ptp::{ClockAccuracy, ClockIdentity, ClockQuality, PortIdentity, Timestamp, TimeSource},
    read_u16,
};

use bytes::{BufMut, BytesMut};

/// Announce message body. From IEEE 1588-2008 13.5.
///
/// Advertises the grandmaster the sender is synchronized to; the fields
/// are exactly the tuple the best-master-clock comparison runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announce {
    pub origin_timestamp: Timestamp,
    pub current_utc_offset: i16,
    pub grandmaster_priority1: u8,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority2: u8,
    pub grandmaster_identity: ClockIdentity,
    pub steps_removed: u16,
    pub time_source: TimeSource,
}

impl Announce {
    pub const BODY_SIZE: usize = 30;

    /// # Test
    ///
    /// ```
    /// use ravennakit_codec::ptp::{Announce, ClockAccuracy};
    ///
    /// let body = [
    ///     0x00u8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // origin
    ///     0x00, 0x25, // utc offset
    ///     0x00, // reserved
    ///     0x80, // priority1
    ///     0x06, 0x21, 0x4e, 0x5d, // clock quality
    ///     0x80, // priority2
    ///     0x00, 0x1d, 0xc1, 0xff, 0xfe, 0x07, 0x08, 0x09, // gm identity
    ///     0x00, 0x00, // steps removed
    ///     0x20, // time source
    /// ];
    ///
    /// let msg = Announce::from_bytes(&body).unwrap();
    ///
    /// assert_eq!(msg.current_utc_offset, 37);
    /// assert_eq!(msg.grandmaster_priority1, 128);
    /// assert_eq!(msg.grandmaster_clock_quality.class, 6);
    /// assert_eq!(msg.grandmaster_clock_quality.accuracy, ClockAccuracy::Within100Ns);
    /// assert_eq!(msg.grandmaster_clock_quality.offset_scaled_log_variance, 0x4e5d);
    /// assert_eq!(msg.steps_removed, 0);
    /// ```
    pub fn from_bytes(body: &[u8]) -> Result<Self, Error> {
        if body.len() < Self::BODY_SIZE {
            return Err(Error::InvalidMessageLength);
        }

        Ok(Self {
            origin_timestamp: Timestamp::from_bytes(body)?,
            current_utc_offset: read_u16(body, 10) as i16,
            grandmaster_priority1: body[13],
            grandmaster_clock_quality: ClockQuality {
                class: body[14],
                accuracy: ClockAccuracy::from(body[15]),
                offset_scaled_log_variance: read_u16(body, 16),
            },
            grandmaster_priority2: body[18],
            grandmaster_identity: ClockIdentity::from_bytes(&body[19..27])?,
            steps_removed: read_u16(body, 27),
            time_source: TimeSource::from(body[29]),
        })
    }
}

/// Sync message body: the (possibly zero) origin timestamp. With the
/// two-step flag set the timestamp is meaningless and the precise value
/// follows in a Follow_Up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sync {
    pub origin_timestamp: Timestamp,
}

impl Sync {
    pub const BODY_SIZE: usize = 10;

    pub fn from_bytes(body: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            origin_timestamp: Timestamp::from_bytes(body)?,
        })
    }
}

/// Follow_Up message body: the precise transmit timestamp of the
/// preceding two-step Sync with the same sequence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUp {
    pub precise_origin_timestamp: Timestamp,
}

impl FollowUp {
    pub const BODY_SIZE: usize = 10;

    pub fn from_bytes(body: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            precise_origin_timestamp: Timestamp::from_bytes(body)?,
        })
    }
}

/// Delay_Req message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayReq {
    pub origin_timestamp: Timestamp,
}

impl DelayReq {
    pub const BODY_SIZE: usize = 10;

    pub fn from_bytes(body: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            origin_timestamp: Timestamp::from_bytes(body)?,
        })
    }
}

/// Delay_Resp message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayResp {
    pub receive_timestamp: Timestamp,
    pub requesting_port_identity: PortIdentity,
}

impl DelayResp {
    pub const BODY_SIZE: usize = 20;

    pub fn from_bytes(body: &[u8]) -> Result<Self, Error> {
        if body.len() < Self::BODY_SIZE {
            return Err(Error::InvalidMessageLength);
        }

        Ok(Self {
            receive_timestamp: Timestamp::from_bytes(body)?,
            requesting_port_identity: PortIdentity::from_bytes(&body[Timestamp::SIZE..])?,
        })
    }
}

/// Pdelay_Req message body. The 10 reserved bytes after the timestamp
/// keep the message the same length as Pdelay_Resp, per IEEE 1588-2008
/// 13.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdelayReq {
    pub origin_timestamp: Timestamp,
}

impl PdelayReq {
    pub const BODY_SIZE: usize = 20;

    pub fn from_bytes(body: &[u8]) -> Result<Self, Error> {
        if body.len() < Self::BODY_SIZE {
            return Err(Error::InvalidMessageLength);
        }

        Ok(Self {
            origin_timestamp: Timestamp::from_bytes(body)?,
        })
    }

    pub fn write_to(&self, buffer: &mut BytesMut) {
        self.origin_timestamp.write_to(buffer);
        buffer.put_bytes(0, 10);
    }
}

/// Pdelay_Resp message body: the receipt time of the request (t2) and
/// the identity of the requester so it can match responses to its own
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdelayResp {
    pub request_receipt_timestamp: Timestamp,
    pub requesting_port_identity: PortIdentity,
}

impl PdelayResp {
    pub const BODY_SIZE: usize = 20;

    pub fn from_bytes(body: &[u8]) -> Result<Self, Error> {
        if body.len() < Self::BODY_SIZE {
            return Err(Error::InvalidMessageLength);
        }

        Ok(Self {
            request_receipt_timestamp: Timestamp::from_bytes(body)?,
            requesting_port_identity: PortIdentity::from_bytes(&body[Timestamp::SIZE..])?,
        })
    }

    pub fn write_to(&self, buffer: &mut BytesMut) {
        self.request_receipt_timestamp.write_to(buffer);
        self.requesting_port_identity.write_to(buffer);
    }
}

/// Pdelay_Resp_Follow_Up message body: the precise transmit time of the
/// preceding Pdelay_Resp (t3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdelayRespFollowUp {
    pub response_origin_timestamp: Timestamp,
    pub requesting_port_identity: PortIdentity,
}

impl PdelayRespFollowUp {
    pub const BODY_SIZE: usize = 20;

    pub fn from_bytes(body: &[u8]) -> Result<Self, Error> {
        if body.len() < Self::BODY_SIZE {
            return Err(Error::InvalidMessageLength);
        }

        Ok(Self {
            response_origin_timestamp: Timestamp::from_bytes(body)?,
            requesting_port_identity: PortIdentity::from_bytes(&body[Timestamp::SIZE..])?,
        })
    }

    pub fn write_to(&self, buffer: &mut BytesMut) {
        self.response_origin_timestamp.write_to(buffer);
        self.requesting_port_identity.write_to(buffer);
    }
}

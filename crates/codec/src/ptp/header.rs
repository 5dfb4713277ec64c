use crate::{
    Error,
    ptp::{MessageType, PortIdentity},
    read_u16, read_u64,
};

use bytes::{BufMut, BytesMut};

/// The size of the common message header. From IEEE 1588-2008 13.3.1.
pub const HEADER_SIZE: usize = 34;

/// The twoStepFlag in the flag field: set on a Sync whose precise origin
/// timestamp follows in a separate Follow_Up message.
pub const FLAG_TWO_STEP: u16 = 0x0200;

/// The common header carried by every PTP message. From IEEE 1588-2008
/// 13.3.
///
/// The correction field is in nanoseconds multiplied by 2^16; transparent
/// clocks along the path accumulate their residence time into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub transport_specific: u8,
    pub message_type: MessageType,
    pub version: u8,
    pub message_length: u16,
    pub domain_number: u8,
    pub flags: u16,
    pub correction: i64,
    pub source_port_identity: PortIdentity,
    pub sequence_id: u16,
    pub control: u8,
    pub log_message_interval: i8,
}

impl MessageHeader {
    /// Decodes the common header from the start of a datagram.
    ///
    /// Validates the PTP version, the declared message length against the
    /// actual buffer, and the message type nibble.
    ///
    /// # Test
    ///
    /// ```
    /// use ravennakit_codec::ptp::{MessageHeader, MessageType};
    ///
    /// let buffer = [
    ///     0x00u8, 0x02, 0x00, 0x2c, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
    ///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1d,
    ///     0xc1, 0xff, 0xfe, 0x07, 0x08, 0x09, 0x00, 0x01, 0x04, 0xd2, 0x00,
    ///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    /// ];
    ///
    /// let header = MessageHeader::from_bytes(&buffer).unwrap();
    ///
    /// assert_eq!(header.message_type, MessageType::Sync);
    /// assert_eq!(header.version, 2);
    /// assert_eq!(header.message_length, 44);
    /// assert_eq!(header.sequence_id, 1234);
    /// assert!(header.is_two_step());
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidMessageLength);
        }

        let version = bytes[1] & 0x0F;
        if version != 2 {
            return Err(Error::InvalidVersion);
        }

        let message_length = read_u16(bytes, 2);
        if (message_length as usize) < HEADER_SIZE || message_length as usize > bytes.len() {
            return Err(Error::InvalidMessageLength);
        }

        let message_type =
            MessageType::try_from(bytes[0] & 0x0F).map_err(|_| Error::UnknownMessageType)?;

        Ok(Self {
            transport_specific: bytes[0] >> 4,
            message_type,
            version,
            message_length,
            domain_number: bytes[4],
            flags: read_u16(bytes, 6),
            correction: read_u64(bytes, 8) as i64,
            source_port_identity: PortIdentity::from_bytes(&bytes[20..30])?,
            sequence_id: read_u16(bytes, 30),
            control: bytes[32],
            log_message_interval: bytes[33] as i8,
        })
    }

    pub fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_u8(self.transport_specific << 4 | u8::from(self.message_type) & 0x0F);
        buffer.put_u8(self.version & 0x0F);
        buffer.put_u16(self.message_length);
        buffer.put_u8(self.domain_number);
        buffer.put_u8(0);
        buffer.put_u16(self.flags);
        buffer.put_u64(self.correction as u64);
        buffer.put_u32(0);
        self.source_port_identity.write_to(buffer);
        buffer.put_u16(self.sequence_id);
        buffer.put_u8(self.control);
        buffer.put_u8(self.log_message_interval as u8);
    }

    /// Whether the twoStepFlag is set.
    pub fn is_two_step(&self) -> bool {
        self.flags & FLAG_TWO_STEP != 0
    }

    /// The correction field converted to whole nanoseconds, dropping the
    /// 2^16 sub-nanosecond fraction.
    pub fn correction_nanos(&self) -> i64 {
        self.correction >> 16
    }

    /// The body of the message: everything after the common header, up to
    /// the declared message length.
    pub fn body<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[HEADER_SIZE..self.message_length as usize]
    }
}

impl std::fmt::Display for MessageHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} domain={} seq={} source={}",
            self.message_type, self.domain_number, self.sequence_id, self.source_port_identity
        )
    }
}

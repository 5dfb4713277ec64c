//! RTP fixed header and payload access. From RFC 3550 Section 5.1.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::{Error, read_u16, read_u32};

use bytes::{BufMut, BytesMut};

/// The size of the fixed part of the header, up to and including the
/// SSRC.
pub const HEADER_SIZE: usize = 12;

/// Fixed RTP protocol version.
pub const RTP_VERSION: u8 = 2;

/// A read-only view over an RTP packet. The buffer is not copied; keep
/// the datagram alive while using the view.
///
/// Construction validates the header so that every accessor can index
/// without going out of bounds: the version must be 2 and the header
/// length implied by the CSRC count and extension bit must fit inside
/// the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketView<'a> {
    bytes: &'a [u8],
}

impl<'a> PacketView<'a> {
    /// # Test
    ///
    /// ```
    /// use ravennakit_codec::rtp::PacketView;
    ///
    /// let buffer = [
    ///     0x80u8, 0xe1, 0x04, 0xd2, 0x00, 0x00, 0x10, 0x00, 0xde, 0xad, 0xbe,
    ///     0xef, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
    /// ];
    ///
    /// let packet = PacketView::new(&buffer).unwrap();
    ///
    /// assert_eq!(packet.version(), 2);
    /// assert!(packet.marker());
    /// assert_eq!(packet.payload_type(), 97);
    /// assert_eq!(packet.sequence_number(), 1234);
    /// assert_eq!(packet.timestamp(), 4096);
    /// assert_eq!(packet.ssrc(), 0xdeadbeef);
    /// assert_eq!(packet.payload(), &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    /// ```
    pub fn new(bytes: &'a [u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidMessageLength);
        }

        if bytes[0] >> 6 != RTP_VERSION {
            return Err(Error::InvalidVersion);
        }

        let packet = Self { bytes };

        // The extension offset depends only on the CSRC count, so it can
        // be checked before the extension length is read from it.
        let extension_offset = packet.extension_offset();
        if extension_offset > bytes.len() {
            return Err(Error::InvalidMessageLength);
        }

        if packet.has_extension() {
            if extension_offset + 4 > bytes.len() {
                return Err(Error::TruncatedExtension);
            }
            if packet.header_len() > bytes.len() {
                return Err(Error::TruncatedExtension);
            }
        }

        Ok(packet)
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.bytes[0] >> 6
    }

    #[inline]
    pub fn padding(&self) -> bool {
        self.bytes[0] & 0x20 != 0
    }

    #[inline]
    pub fn has_extension(&self) -> bool {
        self.bytes[0] & 0x10 != 0
    }

    #[inline]
    pub fn csrc_count(&self) -> usize {
        (self.bytes[0] & 0x0F) as usize
    }

    #[inline]
    pub fn marker(&self) -> bool {
        self.bytes[1] & 0x80 != 0
    }

    #[inline]
    pub fn payload_type(&self) -> u8 {
        self.bytes[1] & 0x7F
    }

    #[inline]
    pub fn sequence_number(&self) -> u16 {
        read_u16(self.bytes, 2)
    }

    #[inline]
    pub fn timestamp(&self) -> u32 {
        read_u32(self.bytes, 4)
    }

    #[inline]
    pub fn ssrc(&self) -> u32 {
        read_u32(self.bytes, 8)
    }

    /// The CSRC identifier at the given index, or `None` when the index
    /// is out of range.
    pub fn csrc(&self, index: usize) -> Option<u32> {
        if index >= self.csrc_count() {
            return None;
        }

        Some(read_u32(self.bytes, HEADER_SIZE + index * 4))
    }

    /// The offset of the header extension, which is also the end of the
    /// CSRC list.
    #[inline]
    fn extension_offset(&self) -> usize {
        HEADER_SIZE + self.csrc_count() * 4
    }

    /// The defined-by-profile field of the header extension, if present.
    pub fn extension_profile(&self) -> Option<u16> {
        if !self.has_extension() {
            return None;
        }

        Some(read_u16(self.bytes, self.extension_offset()))
    }

    /// The header extension data words, without the 4-byte extension
    /// header.
    pub fn extension_data(&self) -> Option<&'a [u8]> {
        if !self.has_extension() {
            return None;
        }

        let offset = self.extension_offset();
        Some(&self.bytes[offset + 4..self.header_len()])
    }

    /// The total header length which is also the start of the payload.
    pub fn header_len(&self) -> usize {
        let offset = self.extension_offset();
        if !self.has_extension() {
            return offset;
        }

        offset + 4 + read_u16(self.bytes, offset + 2) as usize * 4
    }

    /// The payload bytes following the header and extension.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[self.header_len()..]
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// An RTP packet emitter holding the per-stream header state. Sequence
/// number and timestamp advance with wrapping arithmetic; the caller
/// decides the step sizes.
#[derive(Debug, Default, Clone)]
pub struct Packet {
    payload_type: u8,
    sequence_number: u16,
    timestamp: u32,
    ssrc: u32,
}

impl Packet {
    pub fn new(payload_type: u8, ssrc: u32) -> Self {
        Self {
            payload_type,
            ssrc,
            ..Default::default()
        }
    }

    pub fn set_sequence_number(&mut self, value: u16) {
        self.sequence_number = value;
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    /// Advances the sequence number, wrapping at 2^16.
    pub fn inc_sequence_number(&mut self, value: u16) -> u16 {
        self.sequence_number = self.sequence_number.wrapping_add(value);
        self.sequence_number
    }

    pub fn set_timestamp(&mut self, value: u32) {
        self.timestamp = value;
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Advances the timestamp by the given number of clock units,
    /// wrapping at 2^32.
    pub fn inc_timestamp(&mut self, value: u32) -> u32 {
        self.timestamp = self.timestamp.wrapping_add(value);
        self.timestamp
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Encodes the fixed header followed by the payload into the buffer.
    /// The buffer is written as-is; the caller resets it between packets.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use ravennakit_codec::rtp::{Packet, PacketView};
    ///
    /// let mut packet = Packet::new(97, 0xcafebabe);
    /// packet.set_sequence_number(41);
    /// packet.set_timestamp(480);
    ///
    /// let mut buf = BytesMut::new();
    /// packet.encode(&[0xAA, 0xBB], &mut buf);
    ///
    /// let view = PacketView::new(&buf).unwrap();
    /// assert_eq!(view.payload_type(), 97);
    /// assert_eq!(view.sequence_number(), 41);
    /// assert_eq!(view.timestamp(), 480);
    /// assert_eq!(view.ssrc(), 0xcafebabe);
    /// assert_eq!(view.payload(), &[0xAA, 0xBB]);
    /// ```
    pub fn encode(&self, payload: &[u8], buffer: &mut BytesMut) {
        // Version 2, no padding, no extension, no CSRC list.
        buffer.put_u8(RTP_VERSION << 6);
        // No marker bit.
        buffer.put_u8(self.payload_type & 0x7F);
        buffer.put_u16(self.sequence_number);
        buffer.put_u32(self.timestamp);
        buffer.put_u32(self.ssrc);
        buffer.put_slice(payload);
    }
}

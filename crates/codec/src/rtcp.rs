//! RTCP compound packets. From RFC 3550 Section 6.
//!
//! A compound packet is a chain of individual RTCP packets, each a 4-byte
//! header followed by `length` 32-bit words of body. The view walks the
//! chain with [`PacketView::next_packet`]; unknown packet types are
//! skipped by the walker, not treated as errors.

use crate::{Error, ntp, read_u16, read_u32, read_u64};

use bytes::{BufMut, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};

/// The fixed part of every RTCP packet header.
pub const HEADER_SIZE: usize = 4;

/// The sender-info section of an SR: NTP timestamp, RTP timestamp,
/// packet count and octet count, after the 4-byte header and SSRC.
const SENDER_INFO_END: usize = 28;

/// A report block is always 24 bytes. From RFC 3550 Section 6.4.1.
pub const REPORT_BLOCK_SIZE: usize = 24;

/// RTCP packet types. From RFC 3550 Section 12.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PacketType {
    /// Sender report, for transmission and reception statistics from
    /// participants that are active senders.
    SenderReport = 200,
    /// Receiver report, for reception statistics from participants that
    /// are not active senders.
    ReceiverReport = 201,
    /// Source description items, including CNAME.
    SourceDescription = 202,
    /// Indicates end of participation.
    Bye = 203,
    /// Application-specific functions.
    App = 204,
    #[num_enum(default)]
    Unknown = 0,
}

/// A read-only view over one RTCP packet inside a compound datagram.
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    bytes: &'a [u8],
}

impl<'a> PacketView<'a> {
    /// Validates the packet header: version 2 and a declared length that
    /// fits inside the remaining buffer.
    pub fn new(bytes: &'a [u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidMessageLength);
        }

        if bytes[0] >> 6 != 2 {
            return Err(Error::InvalidVersion);
        }

        let packet = Self { bytes };
        if packet.len_bytes() > bytes.len() {
            return Err(Error::InvalidMessageLength);
        }

        // A sender report must at least hold the sender info section.
        if packet.packet_type() == PacketType::SenderReport && packet.len_bytes() < SENDER_INFO_END
        {
            return Err(Error::InvalidMessageLength);
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

    /// The reception report count. Zero is a valid value.
    #[inline]
    pub fn report_count(&self) -> usize {
        (self.bytes[0] & 0x1F) as usize
    }

    #[inline]
    pub fn packet_type(&self) -> PacketType {
        PacketType::from(self.bytes[1])
    }

    /// The length of this packet in 32-bit words. The wire encodes the
    /// length minus one; this method returns the actual word count.
    #[inline]
    pub fn len_words(&self) -> usize {
        read_u16(self.bytes, 2) as usize + 1
    }

    /// The length of this packet in bytes.
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.len_words() * 4
    }

    /// The SSRC of the packet sender. Valid for SR and RR packets.
    pub fn ssrc(&self) -> u32 {
        if self.len_bytes() < 8 {
            return 0;
        }

        read_u32(self.bytes, 4)
    }

    /// The NTP timestamp of a sender report, or a zero timestamp for any
    /// other packet type.
    pub fn ntp_timestamp(&self) -> ntp::Timestamp {
        if self.packet_type() != PacketType::SenderReport {
            return ntp::Timestamp::default();
        }

        ntp::Timestamp::from_u64(read_u64(self.bytes, 8))
    }

    /// The RTP timestamp of a sender report, or 0 for any other packet
    /// type.
    pub fn rtp_timestamp(&self) -> u32 {
        if self.packet_type() != PacketType::SenderReport {
            return 0;
        }

        read_u32(self.bytes, 16)
    }

    /// The sender's packet count, if this packet is a sender report.
    pub fn packet_count(&self) -> u32 {
        if self.packet_type() != PacketType::SenderReport {
            return 0;
        }

        read_u32(self.bytes, 20)
    }

    /// The sender's octet count, if this packet is a sender report.
    pub fn octet_count(&self) -> u32 {
        if self.packet_type() != PacketType::SenderReport {
            return 0;
        }

        read_u32(self.bytes, 24)
    }

    /// The report block at the given index, or `None` when the index is
    /// beyond the report count or the block does not fit the packet.
    pub fn report_block(&self, index: usize) -> Option<ReportBlockView<'a>> {
        if index >= self.report_count() {
            return None;
        }

        let base = match self.packet_type() {
            PacketType::SenderReport => SENDER_INFO_END,
            PacketType::ReceiverReport => 8,
            _ => return None,
        };

        let offset = base + index * REPORT_BLOCK_SIZE;
        if offset + REPORT_BLOCK_SIZE > self.len_bytes() {
            return None;
        }

        Some(ReportBlockView {
            bytes: &self.bytes[offset..offset + REPORT_BLOCK_SIZE],
        })
    }

    /// The next packet in the compound buffer, or `None` when this was
    /// the last one or the remainder is not a valid packet.
    pub fn next_packet(&self) -> Option<PacketView<'a>> {
        let offset = self.len_bytes();
        if offset >= self.bytes.len() {
            return None;
        }

        PacketView::new(&self.bytes[offset..]).ok()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        &self.bytes[..self.len_bytes()]
    }
}

/// A read-only view over one 24-byte reception report block.
///
/// ```text
/// |                 SSRC_1 (SSRC of first source)                 |
/// | fraction lost |       cumulative number of packets lost       |
/// |           extended highest sequence number received           |
/// |                      interarrival jitter                      |
/// |                         last SR (LSR)                         |
/// |                   delay since last SR (DLSR)                  |
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ReportBlockView<'a> {
    bytes: &'a [u8],
}

impl<'a> ReportBlockView<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, Error> {
        if bytes.len() != REPORT_BLOCK_SIZE {
            return Err(Error::InvalidMessageLength);
        }

        Ok(Self { bytes })
    }

    #[inline]
    pub fn ssrc(&self) -> u32 {
        read_u32(self.bytes, 0)
    }

    /// The fraction of packets lost since the previous report, as a
    /// fixed-point number with the binary point at the left edge.
    #[inline]
    pub fn fraction_lost(&self) -> u8 {
        self.bytes[4]
    }

    /// The cumulative number of packets lost, a 24-bit value.
    pub fn cumulative_lost(&self) -> u32 {
        u32::from_be_bytes([0, self.bytes[5], self.bytes[6], self.bytes[7]])
    }

    /// The extended highest sequence number received: wrap cycles in the
    /// high 16 bits, the highest sequence number in the low 16.
    #[inline]
    pub fn extended_highest_sequence_number(&self) -> u32 {
        read_u32(self.bytes, 8)
    }

    #[inline]
    pub fn interarrival_jitter(&self) -> u32 {
        read_u32(self.bytes, 12)
    }

    /// The middle 32 bits of the NTP timestamp of the last SR received
    /// from this source.
    pub fn last_sr_timestamp(&self) -> ntp::Timestamp {
        ntp::Timestamp::from_compact(read_u32(self.bytes, 16))
    }

    /// The delay between receiving the last SR from this source and
    /// sending this block, in units of 1/65536 seconds.
    #[inline]
    pub fn delay_since_last_sr(&self) -> u32 {
        read_u32(self.bytes, 20)
    }
}

/// An owned reception report block for outbound reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportBlock {
    pub ssrc: u32,
    pub fraction_lost: u8,
    pub cumulative_lost: u32,
    pub extended_highest_sequence_number: u32,
    pub interarrival_jitter: u32,
    pub last_sr_timestamp: u32,
    pub delay_since_last_sr: u32,
}

impl ReportBlock {
    pub fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_u32(self.ssrc);
        // The cumulative loss counter is a signed 24-bit value on the
        // wire; cap at the largest positive count.
        let lost = self.cumulative_lost.min(0x7F_FFFF);
        buffer.put_u8(self.fraction_lost);
        buffer.put_slice(&lost.to_be_bytes()[1..4]);
        buffer.put_u32(self.extended_highest_sequence_number);
        buffer.put_u32(self.interarrival_jitter);
        buffer.put_u32(self.last_sr_timestamp);
        buffer.put_u32(self.delay_since_last_sr);
    }
}

/// An owned sender report for the outbound RTCP path.
///
/// # Test
///
/// ```
/// use bytes::BytesMut;
/// use ravennakit_codec::ntp;
/// use ravennakit_codec::rtcp::{PacketType, PacketView, SenderReport};
///
/// let report = SenderReport {
///     ssrc: 0xdeadbeef,
///     ntp_timestamp: ntp::Timestamp::new(0x01234567, 0x89abcdef),
///     rtp_timestamp: 48000,
///     packet_count: 1000,
///     octet_count: 288000,
///     report_blocks: vec![],
/// };
///
/// let mut buf = BytesMut::new();
/// report.write_to(&mut buf);
///
/// let view = PacketView::new(&buf).unwrap();
/// assert_eq!(view.packet_type(), PacketType::SenderReport);
/// assert_eq!(view.len_bytes(), 28);
/// assert_eq!(view.ssrc(), 0xdeadbeef);
/// assert_eq!(view.ntp_timestamp(), report.ntp_timestamp);
/// assert_eq!(view.rtp_timestamp(), 48000);
/// assert_eq!(view.packet_count(), 1000);
/// assert_eq!(view.octet_count(), 288000);
/// ```
#[derive(Debug, Default, Clone)]
pub struct SenderReport {
    pub ssrc: u32,
    pub ntp_timestamp: ntp::Timestamp,
    pub rtp_timestamp: u32,
    pub packet_count: u32,
    pub octet_count: u32,
    pub report_blocks: Vec<ReportBlock>,
}

impl SenderReport {
    pub fn write_to(&self, buffer: &mut BytesMut) {
        let count = self.report_blocks.len().min(31);
        let words = (SENDER_INFO_END + count * REPORT_BLOCK_SIZE) / 4;

        buffer.put_u8(2 << 6 | count as u8);
        buffer.put_u8(PacketType::SenderReport.into());
        buffer.put_u16(words as u16 - 1);
        buffer.put_u32(self.ssrc);
        buffer.put_u64(self.ntp_timestamp.as_u64());
        buffer.put_u32(self.rtp_timestamp);
        buffer.put_u32(self.packet_count);
        buffer.put_u32(self.octet_count);

        for block in self.report_blocks.iter().take(count) {
            block.write_to(buffer);
        }
    }
}

use anyhow::Result;
use bytes::BytesMut;
use ravennakit_codec::{Error, ntp, rtcp, rtp};

#[rustfmt::skip]
const PACKET_WITH_CSRC_AND_EXTENSION: &[u8] = &[
    0x92, 0x60,             // v2, extension, cc=2, pt 96
    0x01, 0x02,             // sequence 258
    0x03, 0x04, 0x05, 0x06, // timestamp
    0xaa, 0xbb, 0xcc, 0xdd, // ssrc
    0x11, 0x11, 0x11, 0x11, // csrc 0
    0x22, 0x22, 0x22, 0x22, // csrc 1
    0xbe, 0xde, 0x00, 0x01, // extension header, 1 word
    0xde, 0xad, 0xbe, 0xef, // extension data
    0x01, 0x02, 0x03,       // payload
];

#[test]
fn test_rtp_view() -> Result<()> {
    let packet = rtp::PacketView::new(PACKET_WITH_CSRC_AND_EXTENSION)?;

    assert_eq!(packet.version(), 2);
    assert!(!packet.padding());
    assert!(packet.has_extension());
    assert_eq!(packet.csrc_count(), 2);
    assert!(!packet.marker());
    assert_eq!(packet.payload_type(), 96);
    assert_eq!(packet.sequence_number(), 258);
    assert_eq!(packet.timestamp(), 0x03040506);
    assert_eq!(packet.ssrc(), 0xaabbccdd);
    assert_eq!(packet.csrc(0), Some(0x11111111));
    assert_eq!(packet.csrc(1), Some(0x22222222));
    assert_eq!(packet.csrc(2), None);
    assert_eq!(packet.extension_profile(), Some(0xbede));
    assert_eq!(packet.extension_data(), Some(&[0xde, 0xad, 0xbe, 0xef][..]));
    assert_eq!(packet.header_len(), 28);
    assert_eq!(packet.payload(), &[0x01, 0x02, 0x03]);

    Ok(())
}

#[test]
fn test_rtp_validation() {
    // Truncated fixed header.
    assert!(matches!(
        rtp::PacketView::new(&PACKET_WITH_CSRC_AND_EXTENSION[..11]),
        Err(Error::InvalidMessageLength)
    ));

    // Wrong version.
    let mut bad_version = PACKET_WITH_CSRC_AND_EXTENSION.to_vec();
    bad_version[0] = 0x52;
    assert!(matches!(
        rtp::PacketView::new(&bad_version),
        Err(Error::InvalidVersion)
    ));

    // CSRC count pointing past the buffer.
    let mut bad_csrc = PACKET_WITH_CSRC_AND_EXTENSION[..12].to_vec();
    bad_csrc[0] = 0x8f; // cc=15, no extension
    assert!(matches!(
        rtp::PacketView::new(&bad_csrc),
        Err(Error::InvalidMessageLength)
    ));

    // Declared extension length beyond the buffer.
    let mut bad_extension = PACKET_WITH_CSRC_AND_EXTENSION.to_vec();
    bad_extension[23] = 0x20;
    assert!(matches!(
        rtp::PacketView::new(&bad_extension),
        Err(Error::TruncatedExtension)
    ));
}

#[test]
fn test_rtp_encode_round_trip() -> Result<()> {
    let mut packet = rtp::Packet::new(97, 0xcafebabe);
    packet.set_sequence_number(65535);
    packet.set_timestamp(48_000);

    let payload = [0x10u8; 288]; // 1 ms of stereo L24 at 48 kHz
    let mut buf = BytesMut::new();
    packet.encode(&payload, &mut buf);
    assert_eq!(buf.len(), rtp::HEADER_SIZE + payload.len());

    let view = rtp::PacketView::new(&buf)?;
    assert_eq!(view.sequence_number(), 65535);
    assert_eq!(view.timestamp(), 48_000);
    assert_eq!(view.ssrc(), 0xcafebabe);
    assert_eq!(view.payload(), &payload);

    // Wrapping advance.
    assert_eq!(packet.inc_sequence_number(1), 0);
    assert_eq!(packet.inc_timestamp(48), 48_048);

    Ok(())
}

#[test]
fn test_rtcp_sender_report_round_trip() -> Result<()> {
    let report = rtcp::SenderReport {
        ssrc: 0xdeadbeef,
        ntp_timestamp: ntp::Timestamp::new(0xe7000000, 0x80000000),
        rtp_timestamp: 960_000,
        packet_count: 5000,
        octet_count: 1_440_000,
        report_blocks: vec![rtcp::ReportBlock {
            ssrc: 0xaabbccdd,
            fraction_lost: 12,
            cumulative_lost: 34,
            extended_highest_sequence_number: 1 << 16 | 700,
            interarrival_jitter: 9,
            last_sr_timestamp: 0x12345678,
            delay_since_last_sr: 65536,
        }],
    };

    let mut buf = BytesMut::new();
    report.write_to(&mut buf);
    assert_eq!(buf.len(), 52);

    let view = rtcp::PacketView::new(&buf)?;
    assert_eq!(view.version(), 2);
    assert_eq!(view.packet_type(), rtcp::PacketType::SenderReport);
    assert_eq!(view.len_words() * 4, 52);
    assert_eq!(view.report_count(), 1);
    assert_eq!(view.ssrc(), 0xdeadbeef);
    assert_eq!(view.ntp_timestamp(), report.ntp_timestamp);
    assert_eq!(view.rtp_timestamp(), 960_000);
    assert_eq!(view.packet_count(), 5000);
    assert_eq!(view.octet_count(), 1_440_000);

    let block = view.report_block(0).expect("one report block");
    assert_eq!(block.ssrc(), 0xaabbccdd);
    assert_eq!(block.fraction_lost(), 12);
    assert_eq!(block.cumulative_lost(), 34);
    assert_eq!(block.extended_highest_sequence_number(), 1 << 16 | 700);
    assert_eq!(block.interarrival_jitter(), 9);
    assert_eq!(block.last_sr_timestamp().compact(), 0x12345678);
    assert_eq!(block.delay_since_last_sr(), 65536);
    assert!(view.report_block(1).is_none());

    Ok(())
}

#[test]
fn test_rtcp_compound_walk() -> Result<()> {
    let report = rtcp::SenderReport {
        ssrc: 1,
        ..Default::default()
    };

    let mut buf = BytesMut::new();
    report.write_to(&mut buf);

    // Append an unknown packet type and an empty receiver report.
    buf.extend_from_slice(&[0x80, 0xd0, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02]);
    buf.extend_from_slice(&[0x80, 0xc9, 0x00, 0x01, 0x00, 0x00, 0x00, 0x03]);

    let first = rtcp::PacketView::new(&buf)?;
    assert_eq!(first.packet_type(), rtcp::PacketType::SenderReport);

    // The unknown packet is walked over, not an error.
    let second = first.next_packet().expect("second packet");
    assert_eq!(second.packet_type(), rtcp::PacketType::Unknown);
    assert_eq!(second.len_bytes(), 8);

    let third = second.next_packet().expect("third packet");
    assert_eq!(third.packet_type(), rtcp::PacketType::ReceiverReport);
    assert_eq!(third.ssrc(), 3);

    assert!(third.next_packet().is_none());

    Ok(())
}

#[test]
fn test_rtcp_validation() {
    // Truncated header.
    assert!(matches!(
        rtcp::PacketView::new(&[0x80, 0xc8, 0x00]),
        Err(Error::InvalidMessageLength)
    ));

    // Wrong version.
    assert!(matches!(
        rtcp::PacketView::new(&[0x40, 0xc8, 0x00, 0x00]),
        Err(Error::InvalidVersion)
    ));

    // Declared length beyond the buffer.
    assert!(matches!(
        rtcp::PacketView::new(&[0x80, 0xc8, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01]),
        Err(Error::InvalidMessageLength)
    ));

    // Report block of the wrong size.
    assert!(rtcp::ReportBlockView::new(&[0u8; 23]).is_err());
    assert!(rtcp::ReportBlockView::new(&[0u8; 24]).is_ok());
}

#[test]
fn test_ntp_compact_round_trip() {
    let ts = ntp::Timestamp::new(0x01234567, 0x89abcdef);
    assert_eq!(ts.compact(), 0x456789ab);

    let compact = ntp::Timestamp::from_compact(ts.compact());
    assert_eq!(compact.integer, 0x4567);
    assert_eq!(compact.fraction, 0x89ab0000);

    let from_parts = ntp::Timestamp::from_compact_parts(0x0123, 0x4567);
    assert_eq!(from_parts.integer, 0x0123);
    assert_eq!(from_parts.fraction, 0x45670000);

    assert_eq!(ntp::Timestamp::from_u64(ts.as_u64()), ts);
}

#[test]
fn test_ntp_from_unix() {
    // 2024-01-01T00:00:00 with half a second of fraction.
    let unix_ns = 1_704_067_200_500_000_000i64;
    let ts = ntp::Timestamp::from_unix_ns(unix_ns);

    assert_eq!(ts.integer as u64, 1_704_067_200 + 2_208_988_800);
    assert_eq!(ts.fraction, 0x80000000);
}

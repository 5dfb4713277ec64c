use anyhow::Result;
use bytes::BytesMut;
use ravennakit_codec::Error;
use ravennakit_codec::ptp::{
    Announce, ClockAccuracy, ClockIdentity, FollowUp, HEADER_SIZE, MessageHeader, MessageType,
    PdelayReq, PdelayResp, PdelayRespFollowUp, PortIdentity, Sync, TimeSource, Timestamp,
};

#[rustfmt::skip]
const TWO_STEP_SYNC: &[u8] = &[
    // header
    0x00, 0x02, 0x00, 0x2c, 0x00, 0x00, 0x02, 0x00, // sync, v2, len 44, domain 0, two-step
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // correction
    0x00, 0x00, 0x00, 0x00,                         // reserved
    0x00, 0x1d, 0xc1, 0xff, 0xfe, 0x07, 0x08, 0x09, // clock identity
    0x00, 0x01,                                     // port number
    0x04, 0xd2,                                     // sequence id 1234
    0x00, 0x7f,                                     // control, log interval
    // body: origin timestamp (zero in two-step mode)
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[rustfmt::skip]
const FOLLOW_UP: &[u8] = &[
    0x08, 0x02, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, // follow-up, v2, len 44
    0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, // correction: 2 ns << 16
    0x00, 0x00, 0x00, 0x00,
    0x00, 0x1d, 0xc1, 0xff, 0xfe, 0x07, 0x08, 0x09,
    0x00, 0x01,
    0x04, 0xd2,
    0x02, 0x7f,
    // body: precise origin timestamp 1703747072.500000000
    0x00, 0x00, 0x65, 0x8d, 0x1e, 0x00, 0x1d, 0xcd, 0x65, 0x00,
];

#[rustfmt::skip]
const ANNOUNCE: &[u8] = &[
    0x0b, 0x02, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, // announce, v2, len 64
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
    0x00, 0x1d, 0xc1, 0xff, 0xfe, 0x07, 0x08, 0x09,
    0x00, 0x01,
    0x00, 0x2a,                                     // sequence id 42
    0x05, 0x01,                                     // control, log interval 1
    // body
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // origin timestamp
    0x00, 0x25,                                     // utc offset 37
    0x00,                                           // reserved
    0x80,                                           // priority1 128
    0x06, 0x21, 0x4e, 0x5d,                         // clock quality
    0x80,                                           // priority2 128
    0x00, 0x1d, 0xc1, 0xff, 0xfe, 0x07, 0x08, 0x09, // grandmaster identity
    0x00, 0x00,                                     // steps removed
    0x20,                                           // time source: gps
];

fn source_port_identity() -> PortIdentity {
    PortIdentity {
        clock_identity: ClockIdentity([0x00, 0x1d, 0xc1, 0xff, 0xfe, 0x07, 0x08, 0x09]),
        port_number: 1,
    }
}

#[test]
fn test_sync_decode() -> Result<()> {
    let header = MessageHeader::from_bytes(TWO_STEP_SYNC)?;

    assert_eq!(header.message_type, MessageType::Sync);
    assert!(header.message_type.is_event());
    assert_eq!(header.version, 2);
    assert_eq!(header.message_length, 44);
    assert_eq!(header.domain_number, 0);
    assert!(header.is_two_step());
    assert_eq!(header.correction_nanos(), 0);
    assert_eq!(header.source_port_identity, source_port_identity());
    assert_eq!(header.sequence_id, 1234);
    assert_eq!(header.log_message_interval, 127);

    let sync = Sync::from_bytes(header.body(TWO_STEP_SYNC))?;
    assert_eq!(sync.origin_timestamp.as_nanos(), 0);

    Ok(())
}

#[test]
fn test_follow_up_decode() -> Result<()> {
    let header = MessageHeader::from_bytes(FOLLOW_UP)?;

    assert_eq!(header.message_type, MessageType::FollowUp);
    assert!(!header.message_type.is_event());
    assert_eq!(header.correction_nanos(), 2);
    assert_eq!(header.sequence_id, 1234);

    let follow_up = FollowUp::from_bytes(header.body(FOLLOW_UP))?;
    assert_eq!(
        follow_up.precise_origin_timestamp,
        Timestamp::new(1703747072, 500_000_000)
    );

    Ok(())
}

#[test]
fn test_announce_decode() -> Result<()> {
    let header = MessageHeader::from_bytes(ANNOUNCE)?;

    assert_eq!(header.message_type, MessageType::Announce);
    assert_eq!(header.sequence_id, 42);
    assert_eq!(header.log_message_interval, 1);

    let announce = Announce::from_bytes(header.body(ANNOUNCE))?;
    assert_eq!(announce.current_utc_offset, 37);
    assert_eq!(announce.grandmaster_priority1, 128);
    assert_eq!(announce.grandmaster_clock_quality.class, 6);
    assert_eq!(
        announce.grandmaster_clock_quality.accuracy,
        ClockAccuracy::Within100Ns
    );
    assert_eq!(
        announce.grandmaster_clock_quality.offset_scaled_log_variance,
        0x4e5d
    );
    assert_eq!(announce.grandmaster_priority2, 128);
    assert_eq!(
        announce.grandmaster_identity,
        source_port_identity().clock_identity
    );
    assert_eq!(announce.steps_removed, 0);
    assert_eq!(announce.time_source, TimeSource::Gps);

    Ok(())
}

#[test]
fn test_header_round_trip() -> Result<()> {
    for packet in [TWO_STEP_SYNC, FOLLOW_UP, ANNOUNCE] {
        let header = MessageHeader::from_bytes(packet)?;

        let mut buf = BytesMut::new();
        header.write_to(&mut buf);

        assert_eq!(&buf[..], &packet[..HEADER_SIZE]);
    }

    Ok(())
}

#[test]
fn test_delay_req_resp_decode() -> Result<()> {
    use ravennakit_codec::ptp::{DelayReq, DelayResp};

    let mut buf = BytesMut::new();
    Timestamp::new(7, 42).write_to(&mut buf);
    let req = DelayReq::from_bytes(&buf)?;
    assert_eq!(req.origin_timestamp, Timestamp::new(7, 42));

    source_port_identity().write_to(&mut buf);
    let resp = DelayResp::from_bytes(&buf)?;
    assert_eq!(resp.receive_timestamp, Timestamp::new(7, 42));
    assert_eq!(resp.requesting_port_identity, source_port_identity());

    Ok(())
}

#[test]
fn test_pdelay_round_trip() -> Result<()> {
    let identity = source_port_identity();

    let req = PdelayReq {
        origin_timestamp: Timestamp::new(100, 250),
    };
    let mut buf = BytesMut::new();
    req.write_to(&mut buf);
    assert_eq!(buf.len(), PdelayReq::BODY_SIZE);
    assert_eq!(PdelayReq::from_bytes(&buf)?, req);

    let resp = PdelayResp {
        request_receipt_timestamp: Timestamp::new(100, 500),
        requesting_port_identity: identity,
    };
    let mut buf = BytesMut::new();
    resp.write_to(&mut buf);
    assert_eq!(buf.len(), PdelayResp::BODY_SIZE);
    assert_eq!(PdelayResp::from_bytes(&buf)?, resp);

    let follow_up = PdelayRespFollowUp {
        response_origin_timestamp: Timestamp::new(100, 750),
        requesting_port_identity: identity,
    };
    let mut buf = BytesMut::new();
    follow_up.write_to(&mut buf);
    assert_eq!(buf.len(), PdelayRespFollowUp::BODY_SIZE);
    assert_eq!(PdelayRespFollowUp::from_bytes(&buf)?, follow_up);

    Ok(())
}

#[test]
fn test_timestamp_round_trip() -> Result<()> {
    let ts = Timestamp::new(0x0000_6123_4567, 999_999_999);

    let mut buf = BytesMut::new();
    ts.write_to(&mut buf);
    assert_eq!(buf.len(), Timestamp::SIZE);
    assert_eq!(Timestamp::from_bytes(&buf)?, ts);

    let ns = ts.as_nanos();
    assert_eq!(Timestamp::from_nanos(ns), ts);

    Ok(())
}

#[test]
fn test_header_validation() {
    // Truncated header.
    assert_eq!(
        MessageHeader::from_bytes(&TWO_STEP_SYNC[..HEADER_SIZE - 1]),
        Err(Error::InvalidMessageLength)
    );

    // Wrong version nibble.
    let mut bad_version = TWO_STEP_SYNC.to_vec();
    bad_version[1] = 0x01;
    assert_eq!(
        MessageHeader::from_bytes(&bad_version),
        Err(Error::InvalidVersion)
    );

    // Declared length beyond the buffer.
    let mut bad_length = TWO_STEP_SYNC.to_vec();
    bad_length[3] = 0xff;
    assert_eq!(
        MessageHeader::from_bytes(&bad_length),
        Err(Error::InvalidMessageLength)
    );

    // Reserved message type nibble.
    let mut bad_type = TWO_STEP_SYNC.to_vec();
    bad_type[0] = 0x04;
    assert_eq!(
        MessageHeader::from_bytes(&bad_type),
        Err(Error::UnknownMessageType)
    );

    // Body shorter than the message type requires.
    assert_eq!(
        Announce::from_bytes(&ANNOUNCE[HEADER_SIZE..HEADER_SIZE + 10]),
        Err(Error::InvalidMessageLength)
    );
}

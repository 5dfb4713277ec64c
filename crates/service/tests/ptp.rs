use bytes::{BufMut, BytesMut};
use codec::ptp::{
    Announce, ClockIdentity, FLAG_TWO_STEP, HEADER_SIZE, MessageHeader, MessageType, PdelayResp,
    PdelayRespFollowUp, PortIdentity, Timestamp,
};
use ravennakit_service::ptp::{ClockState, Port, PortAction, PortConfig, State};

use std::sync::Arc;

const MASTER_IDENTITY: [u8; 8] = [0x00, 0x1d, 0xc1, 0xff, 0xfe, 0x07, 0x08, 0x09];

fn master() -> PortIdentity {
    PortIdentity {
        clock_identity: ClockIdentity(MASTER_IDENTITY),
        port_number: 1,
    }
}

fn make_port() -> Port {
    let identity = PortIdentity {
        clock_identity: ClockIdentity([0xaa; 8]),
        port_number: 1,
    };

    let mut port = Port::new(PortConfig::default(), identity, Arc::new(ClockState::default()));
    port.started();
    port
}

fn header(
    message_type: MessageType,
    body_size: usize,
    source: PortIdentity,
    sequence_id: u16,
    flags: u16,
) -> MessageHeader {
    MessageHeader {
        transport_specific: 0,
        message_type,
        version: 2,
        message_length: (HEADER_SIZE + body_size) as u16,
        domain_number: 0,
        flags,
        correction: 0,
        source_port_identity: source,
        sequence_id,
        control: 0x05,
        log_message_interval: 0,
    }
}

fn announce_bytes(source: PortIdentity, sequence_id: u16, priority1: u8, identity: [u8; 8]) -> BytesMut {
    let mut buf = BytesMut::new();
    header(MessageType::Announce, Announce::BODY_SIZE, source, sequence_id, 0).write_to(&mut buf);

    Timestamp::default().write_to(&mut buf); // origin timestamp
    buf.put_i16(37); // current utc offset
    buf.put_u8(0); // reserved
    buf.put_u8(priority1);
    buf.put_u8(248); // clock class
    buf.put_u8(0x21); // accuracy: within 100ns
    buf.put_u16(0x4e5d); // offset scaled log variance
    buf.put_u8(128); // priority2
    buf.put_slice(&identity);
    buf.put_u16(0); // steps removed
    buf.put_u8(0x20); // time source: gps
    buf
}

fn sync_bytes(source: PortIdentity, sequence_id: u16, origin: Timestamp, two_step: bool) -> BytesMut {
    let flags = if two_step { FLAG_TWO_STEP } else { 0 };
    let mut buf = BytesMut::new();
    header(MessageType::Sync, 10, source, sequence_id, flags).write_to(&mut buf);
    origin.write_to(&mut buf);
    buf
}

fn follow_up_bytes(source: PortIdentity, sequence_id: u16, precise_origin: Timestamp) -> BytesMut {
    let mut buf = BytesMut::new();
    header(MessageType::FollowUp, 10, source, sequence_id, 0).write_to(&mut buf);
    precise_origin.write_to(&mut buf);
    buf
}

#[test]
fn test_first_announce_selects_master() {
    let mut port = make_port();
    assert_eq!(port.state(), State::Listening);

    let actions = port.handle_datagram(&announce_bytes(master(), 1, 128, MASTER_IDENTITY), 0);

    assert_eq!(port.state(), State::Uncalibrated);
    assert_eq!(port.best_master().unwrap().port_identity, master());
    assert!(matches!(actions[..], [PortAction::ResetAnnounceTimer(_)]));
    assert_eq!(
        port.clock().grandmaster_identity(),
        Some(ClockIdentity(MASTER_IDENTITY))
    );
}

#[test]
fn test_better_announce_wins_selection() {
    let mut port = make_port();
    port.handle_datagram(&announce_bytes(master(), 1, 128, MASTER_IDENTITY), 0);

    // A worse (higher priority1) master does not displace the current
    // one.
    let worse = PortIdentity {
        clock_identity: ClockIdentity([0xbb; 8]),
        port_number: 1,
    };
    port.handle_datagram(&announce_bytes(worse, 1, 200, [0xbb; 8]), 0);
    assert_eq!(port.best_master().unwrap().port_identity, master());

    // A better (lower priority1) master does.
    let better = PortIdentity {
        clock_identity: ClockIdentity([0x01; 8]),
        port_number: 1,
    };
    port.handle_datagram(&announce_bytes(better, 1, 1, [0x01; 8]), 0);
    assert_eq!(port.best_master().unwrap().port_identity, better);
    assert_eq!(port.state(), State::Uncalibrated);
}

#[test]
fn test_out_of_order_announces_are_dropped() {
    let mut port = make_port();

    port.handle_datagram(&announce_bytes(master(), 10, 128, MASTER_IDENTITY), 0);
    let actions = port.handle_datagram(&announce_bytes(master(), 9, 128, MASTER_IDENTITY), 0);

    assert!(actions.is_empty());
    assert_eq!(port.stats().out_of_order_announces, 1);
}

#[test]
fn test_foreign_domain_is_ignored() {
    let mut port = make_port();

    let mut announce = announce_bytes(master(), 1, 128, MASTER_IDENTITY);
    announce[4] = 42; // domain number
    let actions = port.handle_datagram(&announce, 0);

    assert!(actions.is_empty());
    assert!(port.best_master().is_none());
}

#[test]
fn test_sync_without_master_is_rejected() {
    let mut port = make_port();

    port.handle_datagram(&sync_bytes(master(), 1, Timestamp::default(), true), 1_000);

    assert_eq!(port.stats().rejected_syncs, 1);
}

#[test]
fn test_follow_up_sequence_mismatch_is_discarded() {
    let mut port = make_port();
    port.handle_datagram(&announce_bytes(master(), 1, 128, MASTER_IDENTITY), 0);

    port.handle_datagram(&sync_bytes(master(), 5, Timestamp::default(), true), 1_000);
    port.handle_datagram(&follow_up_bytes(master(), 6, Timestamp::from_nanos(900)), 0);

    assert_eq!(port.stats().follow_up_mismatches, 1);
    assert_eq!(port.stats().offset_from_master.count(), 0);
}

#[test]
fn test_new_sync_replaces_pending_pair() {
    let mut port = make_port();
    port.handle_datagram(&announce_bytes(master(), 1, 128, MASTER_IDENTITY), 0);

    port.handle_datagram(&sync_bytes(master(), 5, Timestamp::default(), true), 1_000);
    port.handle_datagram(&sync_bytes(master(), 6, Timestamp::default(), true), 2_000);

    assert_eq!(port.stats().sync_missed, 1);

    // The follow-up for the replaced sync is a mismatch, the one for
    // the latest sync applies.
    port.handle_datagram(&follow_up_bytes(master(), 5, Timestamp::from_nanos(900)), 0);
    assert_eq!(port.stats().follow_up_mismatches, 1);

    port.handle_datagram(&follow_up_bytes(master(), 6, Timestamp::from_nanos(1_900)), 0);
    assert_eq!(port.stats().offset_from_master.count(), 1);
}

#[test]
fn test_announce_timeout_falls_back_to_listening() {
    let mut port = make_port();
    port.handle_datagram(&announce_bytes(master(), 1, 128, MASTER_IDENTITY), 0);
    assert_eq!(port.state(), State::Uncalibrated);

    port.handle_announce_timeout();

    assert_eq!(port.state(), State::Listening);
    assert!(port.best_master().is_none());
    assert!(!port.clock().calibrated());
    assert_eq!(port.clock().grandmaster_identity(), None);
}

// Scenario: the servo locks onto a steady 500 us offset and reports
// calibrated, with the published correction within 20 us of the true
// value.
#[test]
fn test_servo_locks_on_synthetic_syncs() {
    let mut port = make_port();
    port.handle_datagram(&announce_bytes(master(), 1, 128, MASTER_IDENTITY), 0);

    let offset_ns: i64 = 500_000;
    let sync_interval_ns: i64 = 125_000_000;

    // A deterministic jitter pattern with ~5 us amplitude.
    let noise = [4_700i64, -3_100, 1_900, -4_300, 2_500, -800, 3_700, -2_900];

    for k in 0..100u16 {
        let t1 = 1_000_000_000 + k as i64 * sync_interval_ns;
        let t2 = t1 + offset_ns + noise[k as usize % noise.len()];

        port.handle_datagram(&sync_bytes(master(), k, Timestamp::default(), true), t2);
        port.handle_datagram(
            &follow_up_bytes(master(), k, Timestamp::from_nanos(t1)),
            0,
        );
    }

    let clock = port.clock();
    assert!(clock.calibrated());
    assert_eq!(port.state(), State::Slave);
    assert!(
        (clock.offset_ns() + offset_ns).abs() < 20_000,
        "correction {} did not settle near {}",
        clock.offset_ns(),
        -offset_ns
    );
    assert!(port.stats().filtered_offset.count() > 0);
}

#[test]
fn test_large_offset_steps_the_clock() {
    let mut port = make_port();
    port.handle_datagram(&announce_bytes(master(), 1, 128, MASTER_IDENTITY), 0);

    // 5 seconds of offset: way beyond the step threshold.
    let t1 = 1_000_000_000i64;
    let t2 = t1 + 5_000_000_000;

    port.handle_datagram(&sync_bytes(master(), 1, Timestamp::default(), true), t2);
    port.handle_datagram(&follow_up_bytes(master(), 1, Timestamp::from_nanos(t1)), 0);

    assert_eq!(port.clock().offset_ns(), -5_000_000_000);
    assert!(!port.clock().calibrated());
    assert_eq!(port.stats().ignored_outliers, 1);

    // After the step the residual offset is zero.
    let t1 = t1 + 125_000_000;
    let t2 = t1 + 5_000_000_000;
    port.handle_datagram(&sync_bytes(master(), 2, Timestamp::default(), true), t2);
    port.handle_datagram(&follow_up_bytes(master(), 2, Timestamp::from_nanos(t1)), 0);

    assert_eq!(port.stats().ignored_outliers, 1);
    assert_eq!(port.clock().offset_ns(), -5_000_000_000);
}

#[test]
fn test_pdelay_responder_emits_resp_and_follow_up() {
    let mut port = make_port();

    let mut request = BytesMut::new();
    header(MessageType::PdelayReq, 20, master(), 7, 0).write_to(&mut request);
    Timestamp::from_nanos(123_456_789).write_to(&mut request);
    request.put_bytes(0, 10);

    let rx_ns = 999_000_111;
    let actions = port.handle_datagram(&request, rx_ns);
    assert_eq!(actions.len(), 2);

    let PortAction::SendEvent(resp_bytes) = &actions[0] else {
        panic!("expected a pdelay response on the event port");
    };
    let resp_header = MessageHeader::from_bytes(resp_bytes).unwrap();
    assert_eq!(resp_header.message_type, MessageType::PdelayResp);
    assert_eq!(resp_header.sequence_id, 7);
    assert!(resp_header.is_two_step());

    let resp = PdelayResp::from_bytes(resp_header.body(resp_bytes)).unwrap();
    assert_eq!(resp.request_receipt_timestamp.as_nanos(), rx_ns);
    assert_eq!(resp.requesting_port_identity, master());

    let PortAction::SendGeneral(follow_up_bytes) = &actions[1] else {
        panic!("expected a pdelay response follow-up on the general port");
    };
    let follow_up_header = MessageHeader::from_bytes(follow_up_bytes).unwrap();
    assert_eq!(follow_up_header.message_type, MessageType::PdelayRespFollowUp);

    let follow_up = PdelayRespFollowUp::from_bytes(follow_up_header.body(follow_up_bytes)).unwrap();
    assert_eq!(follow_up.requesting_port_identity, master());
}

#[test]
fn test_pdelay_initiator_measures_link_delay() {
    let mut port = make_port();
    let identity = port.identity();

    let t1 = 1_000_000_000i64;
    let actions = port.handle_pdelay_timer(t1);
    assert_eq!(actions.len(), 1);

    let PortAction::SendEvent(request) = &actions[0] else {
        panic!("expected a pdelay request on the event port");
    };
    let request_header = MessageHeader::from_bytes(request).unwrap();
    assert_eq!(request_header.message_type, MessageType::PdelayReq);
    let sequence_id = request_header.sequence_id;

    // The peer received our request 40 us after t1 and answered 10 us
    // later; we saw the response 90 us after t1. The link delay is
    // ((t4 - t1) - (t3 - t2)) / 2 = (90us - 10us) / 2 = 40 us.
    let t2 = t1 + 40_000;
    let t3 = t1 + 50_000;
    let t4 = t1 + 90_000;

    let mut resp = BytesMut::new();
    header(MessageType::PdelayResp, 20, master(), sequence_id, FLAG_TWO_STEP).write_to(&mut resp);
    Timestamp::from_nanos(t2).write_to(&mut resp);
    identity.write_to(&mut resp);
    port.handle_datagram(&resp, t4);

    let mut follow_up = BytesMut::new();
    header(MessageType::PdelayRespFollowUp, 20, master(), sequence_id, 0).write_to(&mut follow_up);
    Timestamp::from_nanos(t3).write_to(&mut follow_up);
    identity.write_to(&mut follow_up);
    port.handle_datagram(&follow_up, 0);

    assert_eq!(port.clock().mean_path_delay_ns(), 40_000);
}

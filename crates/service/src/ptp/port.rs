use crate::filter::IntervalStats;
use crate::ptp::clock::ClockState;
use crate::ptp::servo::Servo;
use crate::ptp::stats::Stats;
use crate::sliding::SlidingStats;
use crate::wrapping::Wrapping16;

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use codec::ptp::{
    Announce, ClockIdentity, FLAG_TWO_STEP, FollowUp, HEADER_SIZE, MessageHeader, MessageType,
    PdelayReq, PdelayResp, PdelayRespFollowUp, PortIdentity, Sync, Timestamp,
};

use rand::RngCore;

/// The states of a slave-only port. Only the slave-relevant subset of
/// IEEE 1588-2008 9.2.5 is implemented; there is no master path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum State {
    Initializing,
    /// No master selected; waiting for a qualifying Announce.
    Listening,
    /// A master is selected but the servo has not converged yet.
    Uncalibrated,
    /// Synchronized to the selected master within the calibration
    /// threshold.
    Slave,
    /// The port's sockets could not be opened; requires intervention.
    Faulty,
}

/// Configuration of a port, all values straight from the config surface.
#[derive(Debug, Clone, Copy)]
pub struct PortConfig {
    pub domain: u8,
    /// Announce intervals without an Announce before the master is
    /// dropped. IEEE 1588 default 3.
    pub announce_receipt_timeout: u8,
    pub servo_gain: f64,
    pub step_threshold_ns: i64,
    pub calibrated_threshold_ns: i64,
    /// log2 of the Pdelay_Req emission interval in seconds.
    pub log_pdelay_req_interval: i8,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            domain: 0,
            announce_receipt_timeout: 3,
            servo_gain: crate::ptp::servo::DEFAULT_GAIN,
            step_threshold_ns: crate::ptp::servo::DEFAULT_STEP_THRESHOLD_NS,
            calibrated_threshold_ns: crate::ptp::servo::DEFAULT_CALIBRATED_THRESHOLD_NS,
            log_pdelay_req_interval: 0,
        }
    }
}

/// The master a port is currently tracking.
#[derive(Debug, Clone)]
pub struct ForeignMaster {
    pub port_identity: PortIdentity,
    pub announce: Announce,
    pub log_announce_interval: i8,
    last_sequence_id: Wrapping16,
}

/// What the caller must do after feeding an event into the port. The
/// port itself performs no I/O.
#[derive(Debug)]
pub enum PortAction {
    /// Send a datagram to the event port (319) of the primary multicast
    /// group.
    SendEvent(BytesMut),
    /// Send a datagram to the general port (320) of the primary
    /// multicast group.
    SendGeneral(BytesMut),
    /// (Re)arm the announce receipt timer with the given timeout.
    ResetAnnounceTimer(Duration),
}

#[derive(Debug, Clone, Copy)]
struct PendingSync {
    sequence_id: u16,
    t2_ns: i64,
    correction_ns: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct PendingPdelay {
    sequence_id: u16,
    t1_ns: i64,
    t2_ns: Option<i64>,
    t3_ns: Option<i64>,
    t4_ns: Option<i64>,
    correction_ns: i64,
}

/// The slave endpoint of one network interface: consumes decoded PTP
/// messages plus their local receipt times and drives the servo, the
/// best-master selection and the peer-delay measurement. All I/O and
/// timers live with the caller, which makes every transition testable
/// with synthetic timestamps.
pub struct Port {
    config: PortConfig,
    identity: PortIdentity,
    state: State,
    best_master: Option<ForeignMaster>,
    servo: Servo,
    stats: Stats,
    clock: Arc<ClockState>,
    pending_sync: Option<PendingSync>,
    sync_interval: IntervalStats,
    last_sync_arrival_ns: Option<i64>,
    // Peer delay initiator state.
    pdelay_sequence_id: u16,
    pending_pdelay: Option<PendingPdelay>,
    path_delay_window: SlidingStats,
}

impl Port {
    pub fn new(config: PortConfig, identity: PortIdentity, clock: Arc<ClockState>) -> Self {
        Self {
            servo: Servo::new(
                config.servo_gain,
                config.step_threshold_ns,
                config.calibrated_threshold_ns,
            ),
            config,
            identity,
            state: State::Initializing,
            best_master: None,
            stats: Stats::default(),
            clock,
            pending_sync: None,
            sync_interval: IntervalStats::default(),
            last_sync_arrival_ns: None,
            pdelay_sequence_id: 0,
            pending_pdelay: None,
            path_delay_window: SlidingStats::new(16),
        }
    }

    /// Generates a clock identity in the EUI-64 style from random bytes;
    /// used when the interface MAC is not available.
    pub fn generate_identity() -> ClockIdentity {
        let mut bytes = [0u8; 8];
        rand::rng().fill_bytes(&mut bytes);
        // Keep the FF:FE marker in the middle like a MAC-derived EUI-64.
        bytes[3] = 0xFF;
        bytes[4] = 0xFE;
        ClockIdentity(bytes)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn identity(&self) -> PortIdentity {
        self.identity
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The filtered interval between sync arrivals, in milliseconds.
    pub fn sync_interval(&self) -> &IntervalStats {
        &self.sync_interval
    }

    pub fn best_master(&self) -> Option<&ForeignMaster> {
        self.best_master.as_ref()
    }

    pub fn clock(&self) -> &Arc<ClockState> {
        &self.clock
    }

    /// Marks the port as started: the caller opened its sockets.
    pub fn started(&mut self) {
        if self.state == State::Initializing {
            self.state = State::Listening;
        }
    }

    /// Marks the port as faulty: the caller could not open or re-open
    /// its sockets.
    pub fn fault(&mut self) {
        self.state = State::Faulty;
        self.drop_master();
    }

    /// The announce receipt timeout for the currently tracked master:
    /// `announce_receipt_timeout × 2^log_announce_interval` seconds.
    pub fn announce_timeout(&self) -> Duration {
        let log_interval = self
            .best_master
            .as_ref()
            .map_or(1, |master| master.log_announce_interval);
        let interval = 2f64.powi(log_interval as i32);
        Duration::from_secs_f64(self.config.announce_receipt_timeout as f64 * interval)
    }

    /// The Pdelay_Req emission interval: `2^log_pdelay_req_interval`
    /// seconds.
    pub fn pdelay_interval(&self) -> Duration {
        Duration::from_secs_f64(2f64.powi(self.config.log_pdelay_req_interval as i32))
    }

    /// Feeds one received datagram into the port. `rx_unix_ns` is the
    /// local receipt time of the datagram. Returns the follow-up actions
    /// for the caller; malformed or foreign packets produce no actions
    /// and are counted.
    pub fn handle_datagram(&mut self, bytes: &[u8], rx_unix_ns: i64) -> Vec<PortAction> {
        let Ok(header) = MessageHeader::from_bytes(bytes) else {
            return Vec::new();
        };

        if header.domain_number != self.config.domain {
            return Vec::new();
        }

        if header.source_port_identity == self.identity {
            return Vec::new(); // Our own multicast loopback
        }

        let body = header.body(bytes);
        match header.message_type {
            MessageType::Announce => match Announce::from_bytes(body) {
                Ok(msg) => self.handle_announce(&header, &msg),
                Err(_) => Vec::new(),
            },
            MessageType::Sync => match Sync::from_bytes(body) {
                Ok(msg) => self.handle_sync(&header, &msg, rx_unix_ns),
                Err(_) => Vec::new(),
            },
            MessageType::FollowUp => match FollowUp::from_bytes(body) {
                Ok(msg) => self.handle_follow_up(&header, &msg),
                Err(_) => Vec::new(),
            },
            MessageType::PdelayReq => {
                if PdelayReq::from_bytes(body).is_err() {
                    return Vec::new();
                }
                self.handle_pdelay_req(&header, rx_unix_ns)
            }
            MessageType::PdelayResp => match PdelayResp::from_bytes(body) {
                Ok(msg) => self.handle_pdelay_resp(&header, &msg, rx_unix_ns),
                Err(_) => Vec::new(),
            },
            MessageType::PdelayRespFollowUp => match PdelayRespFollowUp::from_bytes(body) {
                Ok(msg) => self.handle_pdelay_resp_follow_up(&header, &msg),
                Err(_) => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Handles an Announce: best-master selection per the dataset
    /// comparison of IEEE 1588-2008 9.3.4, reduced to the slave side.
    fn handle_announce(&mut self, header: &MessageHeader, msg: &Announce) -> Vec<PortAction> {
        if let Some(master) = &mut self.best_master {
            if master.port_identity == header.source_port_identity {
                if master.last_sequence_id.update(header.sequence_id).is_none() {
                    self.stats.out_of_order_announces += 1;
                    return Vec::new();
                }

                master.announce = *msg;
                master.log_announce_interval = header.log_message_interval;
                return vec![PortAction::ResetAnnounceTimer(self.announce_timeout())];
            }

            if dataset(msg) < dataset(&master.announce) {
                self.adopt_master(header, msg);
                return vec![PortAction::ResetAnnounceTimer(self.announce_timeout())];
            }

            return Vec::new();
        }

        self.adopt_master(header, msg);
        vec![PortAction::ResetAnnounceTimer(self.announce_timeout())]
    }

    fn adopt_master(&mut self, header: &MessageHeader, msg: &Announce) {
        self.best_master = Some(ForeignMaster {
            port_identity: header.source_port_identity,
            announce: *msg,
            log_announce_interval: header.log_message_interval,
            last_sequence_id: Wrapping16::new(header.sequence_id),
        });

        self.state = State::Uncalibrated;
        self.servo.reset();
        self.stats.reset();
        self.sync_interval.reset();
        self.pending_sync = None;
        self.last_sync_arrival_ns = None;
        self.path_delay_window.reset();

        self.clock.set_calibrated(false);
        self.clock
            .set_grandmaster(Some(msg.grandmaster_identity));
    }

    /// Handles a Sync event message. With the two-step flag the precise
    /// origin arrives in a later Follow_Up; a one-step Sync is applied
    /// immediately.
    fn handle_sync(&mut self, header: &MessageHeader, msg: &Sync, rx_unix_ns: i64) -> Vec<PortAction> {
        let Some(master) = &self.best_master else {
            self.stats.rejected_syncs += 1;
            return Vec::new();
        };

        if master.port_identity != header.source_port_identity {
            self.stats.rejected_syncs += 1;
            return Vec::new();
        }

        if let Some(last) = self.last_sync_arrival_ns.replace(rx_unix_ns) {
            self.sync_interval
                .update((rx_unix_ns - last) as f64 / 1e6);
        }

        if header.is_two_step() {
            if self.pending_sync.is_some() {
                // A new Sync before its Follow_Up invalidates the pending
                // pair.
                self.stats.sync_missed += 1;
            }

            self.pending_sync = Some(PendingSync {
                sequence_id: header.sequence_id,
                t2_ns: rx_unix_ns,
                correction_ns: header.correction_nanos(),
            });

            return Vec::new();
        }

        let t1_ns = msg.origin_timestamp.as_nanos() + header.correction_nanos();
        self.apply_measurement(t1_ns, rx_unix_ns);
        Vec::new()
    }

    /// Handles a Follow_Up: pairs strictly by sequence id with the
    /// pending two-step Sync of the current master.
    fn handle_follow_up(&mut self, header: &MessageHeader, msg: &FollowUp) -> Vec<PortAction> {
        let Some(master) = &self.best_master else {
            return Vec::new();
        };

        if master.port_identity != header.source_port_identity {
            return Vec::new();
        }

        let Some(pending) = self.pending_sync else {
            self.stats.follow_up_mismatches += 1;
            return Vec::new();
        };

        if pending.sequence_id != header.sequence_id {
            self.stats.follow_up_mismatches += 1;
            return Vec::new();
        }

        self.pending_sync = None;
        let t1_ns = msg.precise_origin_timestamp.as_nanos()
            + pending.correction_ns
            + header.correction_nanos();
        self.apply_measurement(t1_ns, pending.t2_ns);
        Vec::new()
    }

    fn apply_measurement(&mut self, t1_ns: i64, t2_ns: i64) {
        let mean_path_delay_ns = self.mean_path_delay_ns();
        let output = self.servo.process(t1_ns, t2_ns, mean_path_delay_ns);

        self.stats
            .offset_from_master
            .add(output.raw_offset_ns as f64 / 1e9);
        self.stats
            .filtered_offset
            .add(output.filtered_offset_ns as f64 / 1e9);
        if output.stepped {
            self.stats.ignored_outliers += 1;
        }

        self.clock.set_offset_ns(output.correction_ns);
        self.clock.set_mean_path_delay_ns(mean_path_delay_ns);
        self.clock.set_calibrated(output.calibrated);
        self.clock.set_last_sync_unix_ns(t2_ns);

        self.state = match (self.state, output.calibrated) {
            (State::Uncalibrated, true) => State::Slave,
            (State::Slave, false) => State::Uncalibrated,
            (state, _) => state,
        };
    }

    /// Handles a Pdelay_Req as the responder: answers with a two-step
    /// Pdelay_Resp carrying the request receipt time, followed by a
    /// Pdelay_Resp_Follow_Up carrying the response origin time.
    fn handle_pdelay_req(&mut self, header: &MessageHeader, rx_unix_ns: i64) -> Vec<PortAction> {
        let t2 = Timestamp::from_nanos(rx_unix_ns);

        let resp = PdelayResp {
            request_receipt_timestamp: t2,
            requesting_port_identity: header.source_port_identity,
        };
        let mut resp_bytes = BytesMut::with_capacity(HEADER_SIZE + PdelayResp::BODY_SIZE);
        self.message_header(
            MessageType::PdelayResp,
            PdelayResp::BODY_SIZE,
            header.sequence_id,
            FLAG_TWO_STEP,
        )
        .write_to(&mut resp_bytes);
        resp.write_to(&mut resp_bytes);

        // Software timestamping: the response origin time equals the
        // receipt time, the turnaround is covered by the correction
        // fields staying zero.
        let follow_up = PdelayRespFollowUp {
            response_origin_timestamp: t2,
            requesting_port_identity: header.source_port_identity,
        };
        let mut follow_up_bytes =
            BytesMut::with_capacity(HEADER_SIZE + PdelayRespFollowUp::BODY_SIZE);
        self.message_header(
            MessageType::PdelayRespFollowUp,
            PdelayRespFollowUp::BODY_SIZE,
            header.sequence_id,
            0,
        )
        .write_to(&mut follow_up_bytes);
        follow_up.write_to(&mut follow_up_bytes);

        vec![
            PortAction::SendEvent(resp_bytes),
            PortAction::SendGeneral(follow_up_bytes),
        ]
    }

    /// Fires the Pdelay_Req timer as the initiator: emits a request and
    /// records t1.
    pub fn handle_pdelay_timer(&mut self, now_unix_ns: i64) -> Vec<PortAction> {
        if self.state == State::Faulty || self.state == State::Initializing {
            return Vec::new();
        }

        self.pdelay_sequence_id = self.pdelay_sequence_id.wrapping_add(1);
        self.pending_pdelay = Some(PendingPdelay {
            sequence_id: self.pdelay_sequence_id,
            t1_ns: now_unix_ns,
            ..Default::default()
        });

        let req = PdelayReq {
            origin_timestamp: Timestamp::from_nanos(now_unix_ns),
        };
        let mut bytes = BytesMut::with_capacity(HEADER_SIZE + PdelayReq::BODY_SIZE);
        self.message_header(
            MessageType::PdelayReq,
            PdelayReq::BODY_SIZE,
            self.pdelay_sequence_id,
            0,
        )
        .write_to(&mut bytes);
        req.write_to(&mut bytes);

        vec![PortAction::SendEvent(bytes)]
    }

    fn handle_pdelay_resp(
        &mut self,
        header: &MessageHeader,
        msg: &PdelayResp,
        rx_unix_ns: i64,
    ) -> Vec<PortAction> {
        if msg.requesting_port_identity != self.identity {
            return Vec::new();
        }

        let Some(pending) = &mut self.pending_pdelay else {
            return Vec::new();
        };

        if pending.sequence_id != header.sequence_id {
            return Vec::new();
        }

        pending.t2_ns = Some(msg.request_receipt_timestamp.as_nanos());
        pending.t4_ns = Some(rx_unix_ns);
        pending.correction_ns += header.correction_nanos();
        self.try_complete_pdelay();
        Vec::new()
    }

    fn handle_pdelay_resp_follow_up(
        &mut self,
        header: &MessageHeader,
        msg: &PdelayRespFollowUp,
    ) -> Vec<PortAction> {
        if msg.requesting_port_identity != self.identity {
            return Vec::new();
        }

        let Some(pending) = &mut self.pending_pdelay else {
            return Vec::new();
        };

        if pending.sequence_id != header.sequence_id {
            return Vec::new();
        }

        pending.t3_ns = Some(msg.response_origin_timestamp.as_nanos());
        pending.correction_ns += header.correction_nanos();
        self.try_complete_pdelay();
        Vec::new()
    }

    /// Completes a peer delay exchange once all four timestamps are in:
    /// `mean_link_delay = ((t4 − t1) − (t3 − t2)) / 2`, minus the
    /// accumulated correction fields.
    fn try_complete_pdelay(&mut self) {
        let Some(pending) = self.pending_pdelay else {
            return;
        };

        let (Some(t2), Some(t3), Some(t4)) = (pending.t2_ns, pending.t3_ns, pending.t4_ns) else {
            return;
        };

        self.pending_pdelay = None;
        let delay = ((t4 - pending.t1_ns) - (t3 - t2) - pending.correction_ns) / 2;
        if delay < 0 {
            return; // Timestamps from an unsynchronized peer clock
        }

        self.path_delay_window.add(delay as f64);
        self.clock.set_mean_path_delay_ns(self.mean_path_delay_ns());
    }

    /// Handles the announce receipt timeout: the master went silent, so
    /// the port falls back to listening. Non-fatal; a new Announce will
    /// restart selection.
    pub fn handle_announce_timeout(&mut self) {
        if self.state == State::Faulty {
            return;
        }

        self.drop_master();
        self.state = State::Listening;
    }

    fn drop_master(&mut self) {
        self.best_master = None;
        self.pending_sync = None;
        self.last_sync_arrival_ns = None;
        self.servo.reset();
        self.stats.reset();
        self.sync_interval.reset();
        self.clock.set_calibrated(false);
        self.clock.set_grandmaster(None);
    }

    fn mean_path_delay_ns(&self) -> i64 {
        self.path_delay_window.mean() as i64
    }

    fn message_header(
        &self,
        message_type: MessageType,
        body_size: usize,
        sequence_id: u16,
        flags: u16,
    ) -> MessageHeader {
        MessageHeader {
            transport_specific: 0,
            message_type,
            version: 2,
            message_length: (HEADER_SIZE + body_size) as u16,
            domain_number: self.config.domain,
            flags,
            correction: 0,
            source_port_identity: self.identity,
            sequence_id,
            control: 0x05,
            log_message_interval: 0x7F,
        }
    }
}

/// The comparison tuple of the best-master-clock dataset comparison:
/// lexicographically smaller wins.
fn dataset(msg: &Announce) -> (u8, u8, u8, u16, u8, [u8; 8]) {
    (
        msg.grandmaster_priority1,
        msg.grandmaster_clock_quality.class,
        msg.grandmaster_clock_quality.accuracy.into(),
        msg.grandmaster_clock_quality.offset_scaled_log_variance,
        msg.grandmaster_priority2,
        msg.grandmaster_identity.0,
    )
}

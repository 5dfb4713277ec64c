use crate::server::rtp::{Sender, StreamHandle, open_multicast_socket};
use crate::statistics::{Stats, StatisticsReporter};

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use codec::{ntp, rtcp};
use parking_lot::Mutex;
use service::ptp::ClockState;
use service::rtcp::{PeerReports, PeerSenderReport};
use tokio::net::UdpSocket;

/// The node-wide table of peer sender reports, fed by the ingest tasks
/// and read when composing outbound report blocks.
pub type SharedPeerReports = Arc<Mutex<PeerReports>>;

/// Spawns the RTCP ingest task of one receive stream, listening on the
/// stream's control port (RTP port + 1).
pub fn spawn_ingest(
    stream: &StreamHandle,
    interface: Ipv4Addr,
    peers: SharedPeerReports,
    reporter: StatisticsReporter,
) -> anyhow::Result<()> {
    let description = stream.description();
    let socket = open_multicast_socket(
        description.connection_address,
        description.port + 1,
        interface,
    )
    .with_context(|| format!("open rtcp socket for stream {}", description.name))?;

    tokio::spawn(ingest_task(socket, description.name.clone(), peers, reporter));
    Ok(())
}

/// Reads compound RTCP packets and records the sender report of every
/// peer: the (NTP, RTP) correlation seeds our receiver report blocks.
/// Unknown packet types are walked over, never errors.
async fn ingest_task(
    socket: UdpSocket,
    name: String,
    peers: SharedPeerReports,
    reporter: StatisticsReporter,
) {
    let mut buf = vec![0u8; codec::MTU];

    loop {
        let size = match socket.recv_from(&mut buf).await {
            Ok((size, _)) => size,
            Err(e) => {
                log::warn!("rtcp socket receive error: stream={}, err={:?}", name, e);
                continue;
            }
        };

        reporter.send(&name, &[Stats::RtcpPkts(1)]);

        let mut packet = match rtcp::PacketView::new(&buf[..size]) {
            Ok(packet) => Some(packet),
            Err(_) => {
                reporter.send(&name, &[Stats::InvalidPkts(1)]);
                continue;
            }
        };

        while let Some(view) = packet {
            if view.packet_type() == rtcp::PacketType::SenderReport {
                peers.lock().record(
                    view.ssrc(),
                    PeerSenderReport {
                        ntp_timestamp: view.ntp_timestamp(),
                        rtp_timestamp: view.rtp_timestamp(),
                        received_unix_ns: ClockState::local_unix_ns(),
                    },
                );

                log::trace!(
                    "rtcp sender report: stream={}, ssrc={:#010x}, rtp_ts={}",
                    name,
                    view.ssrc(),
                    view.rtp_timestamp()
                );
            }

            packet = view.next_packet();
        }
    }
}

/// Spawns the sender report emitter for the node's transmit session.
/// Fires every emit interval; each report carries one reception report
/// block per receive stream with a known peer SSRC.
pub fn spawn_emitter(
    sender: Arc<Sender>,
    streams: Vec<StreamHandle>,
    interface: Ipv4Addr,
    clock: Arc<ClockState>,
    peers: SharedPeerReports,
    emit_interval: Duration,
) -> anyhow::Result<()> {
    use socket2::{Domain, Protocol, Socket, Type};

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_multicast_if_v4(&interface)?;
    socket.set_multicast_loop_v4(false)?;
    socket.set_multicast_ttl_v4(32)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
    socket.set_nonblocking(true)?;
    let socket = UdpSocket::from_std(socket.into()).context("open rtcp emit socket")?;

    // The control port of the outbound session.
    let mut target = sender.destination();
    target.set_port(target.port() + 1);

    tokio::spawn(emit_task(
        socket,
        target,
        sender,
        streams,
        clock,
        peers,
        emit_interval,
    ));

    Ok(())
}

async fn emit_task(
    socket: UdpSocket,
    target: SocketAddr,
    sender: Arc<Sender>,
    streams: Vec<StreamHandle>,
    clock: Arc<ClockState>,
    peers: SharedPeerReports,
    emit_interval: Duration,
) {
    let mut timer = tokio::time::interval(emit_interval);
    let mut buf = BytesMut::with_capacity(codec::MTU);

    loop {
        timer.tick().await;

        let now_unix_ns = clock.now_unix_ns();
        let mut report_blocks = Vec::new();

        for stream in &streams {
            let Some(ssrc) = stream.source_ssrc() else {
                continue; // No packet seen yet, nothing to report on
            };

            let shared = stream.shared();
            let jitter = shared.jitter.lock().as_report_value();
            let peers = peers.lock();
            let block = shared.reception.lock().make_report_block(
                ssrc,
                jitter,
                peers.get(ssrc),
                now_unix_ns,
            );
            report_blocks.push(block);
        }

        let report = rtcp::SenderReport {
            ssrc: sender.ssrc(),
            ntp_timestamp: ntp::Timestamp::from_unix_ns(now_unix_ns),
            rtp_timestamp: clock.rtp_timestamp(sender.sample_rate()),
            packet_count: sender.packet_count(),
            octet_count: sender.octet_count(),
            report_blocks,
        };

        buf.clear();
        report.write_to(&mut buf);

        if let Err(e) = socket.send_to(&buf, target).await {
            log::warn!("rtcp send error: dst={}, err={:?}", target, e);
        }
    }
}

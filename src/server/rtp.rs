use crate::observer::Observer;
use crate::sdp::StreamDescription;
use crate::statistics::{Stats, StatisticsReporter};

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use codec::rtp;
use parking_lot::Mutex;
use service::NodeObserver;
use service::ptp::ClockState;
use service::rtcp::ReceptionState;
use service::rtp::{Counters, InterarrivalJitter, PacketStats, Ringbuffer};
use service::throttle::Throttle;
use tokio::net::UdpSocket;

/// How often stream counter changes are forwarded to subscribers at
/// most.
const TELEMETRY_INTERVAL: Duration = Duration::from_millis(100);

/// The state of one receive stream shared between the socket worker,
/// the RTCP tasks and the consumer.
pub struct StreamShared {
    pub description: StreamDescription,
    pub ring: Mutex<Ringbuffer>,
    pub packet_stats: Mutex<PacketStats>,
    pub jitter: Mutex<InterarrivalJitter>,
    pub reception: Mutex<ReceptionState>,
    /// The SSRC observed on the stream, 0 until the first valid packet.
    pub source_ssrc: AtomicU32,
}

/// A cloneable handle to one receive stream.
#[derive(Clone)]
pub struct StreamHandle(Arc<StreamShared>);

impl StreamHandle {
    pub fn description(&self) -> &StreamDescription {
        &self.0.description
    }

    /// Reads frames at the given media clock timestamp into `out`.
    /// Frames that never arrived read as the ground value. With `erase`
    /// the consumed frames are grounded so stalled senders turn into
    /// silence instead of looping stale audio.
    pub fn read(&self, ts: u32, out: &mut [u8], erase: bool) {
        self.0.ring.lock().read(ts, out, erase);
    }

    /// Grounds everything up to the given timestamp and moves the write
    /// cursor there. Returns false when the cursor is already past it.
    pub fn clear_until(&self, ts: u32) -> bool {
        self.0.ring.lock().clear_until(ts)
    }

    /// The current totals of the sequence number accounting, with the
    /// jitter estimate filled in.
    pub fn counters(&self) -> Counters {
        let mut counters = self.0.packet_stats.lock().totals();
        counters.jitter = self.0.jitter.lock().value();
        counters
    }

    /// The SSRC observed on the stream, once a packet has arrived.
    pub fn source_ssrc(&self) -> Option<u32> {
        match self.0.source_ssrc.load(Ordering::Relaxed) {
            0 => None,
            ssrc => Some(ssrc),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<StreamShared> {
        &self.0
    }
}

/// Opens the stream's multicast socket and spawns its receive task.
pub fn spawn_stream(
    description: StreamDescription,
    jitter_buffer_frames: usize,
    ground_value: u8,
    interface: Ipv4Addr,
    clock: Arc<ClockState>,
    observer: Arc<Observer>,
    reporter: StatisticsReporter,
) -> anyhow::Result<StreamHandle> {
    let socket = open_multicast_socket(description.connection_address, description.port, interface)
        .with_context(|| format!("open rtp socket for stream {}", description.name))?;

    let mut ring = Ringbuffer::default();
    ring.set_ground_value(ground_value);
    ring.resize(jitter_buffer_frames, description.frame_bytes());

    let shared = Arc::new(StreamShared {
        description,
        ring: Mutex::new(ring),
        packet_stats: Mutex::new(PacketStats::default()),
        jitter: Mutex::new(InterarrivalJitter::default()),
        reception: Mutex::new(ReceptionState::default()),
        source_ssrc: AtomicU32::new(0),
    });

    tokio::spawn(stream_task(
        socket,
        shared.clone(),
        clock,
        observer,
        reporter,
    ));

    Ok(StreamHandle(shared))
}

/// The receive loop of one stream: validate, account, place into the
/// ring, estimate jitter, publish throttled telemetry.
async fn stream_task(
    socket: UdpSocket,
    shared: Arc<StreamShared>,
    clock: Arc<ClockState>,
    observer: Arc<Observer>,
    reporter: StatisticsReporter,
) {
    let name = shared.description.name.clone();
    let sample_rate = shared.description.sample_rate;
    let frame_bytes = shared.description.frame_bytes();
    let destination = IpAddr::V4(shared.description.connection_address);
    let expected_ssrc = shared.description.ssrc;
    let source_filter = shared.description.source_filter.clone();

    let mut throttle: Throttle<Counters> = Throttle::new(TELEMETRY_INTERVAL);
    let mut last_error: Option<ErrorKind> = None;
    let mut buf = vec![0u8; codec::MTU];

    loop {
        let (size, source) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                // Log only on transition so a dead interface does not
                // flood the log at packet rate.
                if last_error != Some(e.kind()) {
                    last_error = Some(e.kind());
                    log::warn!("rtp socket receive error: stream={}, err={:?}", name, e);
                }
                continue;
            }
        };
        last_error = None;

        reporter.send(
            &name,
            &[Stats::ReceivedBytes(size as u64), Stats::ReceivedPkts(1)],
        );

        let packet = match rtp::PacketView::new(&buf[..size]) {
            Ok(packet) => packet,
            Err(_) => {
                reporter.send(&name, &[Stats::InvalidPkts(1)]);
                continue;
            }
        };

        if let Some(expected) = expected_ssrc {
            if packet.ssrc() != expected {
                reporter.send(&name, &[Stats::RejectedPkts(1)]);
                continue;
            }
        }

        if let Some(filter) = &source_filter {
            if !filter.is_valid_source(destination, source.ip()) {
                reporter.send(&name, &[Stats::RejectedPkts(1)]);
                continue;
            }
        }

        shared.source_ssrc.store(packet.ssrc(), Ordering::Relaxed);

        let sequence_number = packet.sequence_number();
        let timestamp = packet.timestamp();
        let payload = packet.payload();
        let frames = payload.len() / frame_bytes;

        let mut counters_update = {
            let mut stats = shared.packet_stats.lock();
            let mut ring = shared.ring.lock();

            if ring.too_old(timestamp, frames) {
                stats.mark_packet_too_late(sequence_number);
            }

            let update = stats.update(sequence_number);
            ring.write(timestamp, payload);
            update
        };

        shared.reception.lock().packet_received(sequence_number);

        // Interarrival jitter per RFC 3550 6.4.1, with the arrival time
        // taken from the synchronized media clock.
        let arrival_rtp = clock.rtp_timestamp(sample_rate);
        let jitter = shared.jitter.lock().update(arrival_rtp, timestamp);

        if let Some(counters) = &mut counters_update {
            counters.jitter = jitter;
            if let Some(counters) = throttle.update(*counters) {
                observer.rtp_stream_stats_updated(&name, &counters);
            }
        }
    }
}

/// An RTP sender for one outbound session.
///
/// The audio side hands payloads to [`Sender::send_frames`]; sequencing,
/// timestamping and the packet/octet counters the RTCP sender reports
/// need are handled here.
pub struct Sender {
    socket: std::net::UdpSocket,
    destination: SocketAddr,
    packet: Mutex<codec::rtp::Packet>,
    buffer: Mutex<BytesMut>,
    packet_count: AtomicU32,
    octet_count: AtomicU64,
    sample_rate: u32,
    last_error: Mutex<Option<ErrorKind>>,
}

impl Sender {
    pub fn new(
        destination: Ipv4Addr,
        port: u16,
        payload_type: u8,
        sample_rate: u32,
        interface: Ipv4Addr,
    ) -> anyhow::Result<Self> {
        use socket2::{Domain, Protocol, Socket, Type};

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_multicast_if_v4(&interface)?;
        socket.set_multicast_loop_v4(false)?;
        socket.set_multicast_ttl_v4(32)?;
        socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;

        let ssrc = rand_ssrc();
        let mut packet = codec::rtp::Packet::new(payload_type, ssrc);
        packet.set_sequence_number(ssrc as u16);

        Ok(Self {
            socket: socket.into(),
            destination: SocketAddr::V4(SocketAddrV4::new(destination, port)),
            packet: Mutex::new(packet),
            buffer: Mutex::new(BytesMut::with_capacity(codec::MTU)),
            packet_count: AtomicU32::new(0),
            octet_count: AtomicU64::new(0),
            sample_rate,
            last_error: Mutex::new(None),
        })
    }

    pub fn ssrc(&self) -> u32 {
        self.packet.lock().ssrc()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Sends one packet of already-encoded payload covering the given
    /// number of frames.
    pub fn send_frames(&self, payload: &[u8], frames: u32) {
        debug_assert!(payload.len() <= codec::MAX_PAYLOAD);

        let mut buffer = self.buffer.lock();
        {
            let mut packet = self.packet.lock();
            buffer.clear();
            packet.encode(payload, &mut buffer);
            packet.inc_sequence_number(1);
            packet.inc_timestamp(frames);
        }

        match self.socket.send_to(&buffer, self.destination) {
            Ok(_) => {
                *self.last_error.lock() = None;
                self.packet_count.fetch_add(1, Ordering::Relaxed);
                self.octet_count
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                let mut last_error = self.last_error.lock();
                if *last_error != Some(e.kind()) {
                    *last_error = Some(e.kind());
                    log::warn!("rtp send error: dst={}, err={:?}", self.destination, e);
                }
            }
        }
    }

    /// The RTP timestamp the next packet will carry.
    pub fn next_timestamp(&self) -> u32 {
        self.packet.lock().timestamp()
    }

    pub fn packet_count(&self) -> u32 {
        self.packet_count.load(Ordering::Relaxed)
    }

    pub fn octet_count(&self) -> u32 {
        self.octet_count.load(Ordering::Relaxed) as u32
    }
}

fn rand_ssrc() -> u32 {
    use rand::Rng;
    // 0 is reserved as "no source observed".
    rand::rng().random_range(1..=u32::MAX)
}

/// Opens a reusable multicast receive socket joined on the configured
/// interface.
pub fn open_multicast_socket(
    group: Ipv4Addr,
    port: u16,
    interface: Ipv4Addr,
) -> anyhow::Result<UdpSocket> {
    use socket2::{Domain, Protocol, Socket, Type};

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;
    socket.join_multicast_v4(&group, &interface)?;
    socket.set_nonblocking(true)?;

    Ok(UdpSocket::from_std(socket.into())?)
}

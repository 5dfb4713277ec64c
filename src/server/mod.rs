pub mod ptp;
pub mod rtcp;
pub mod rtp;

use crate::config::Config;
use crate::observer::Observer;
use crate::sdp::StreamDescription;
use crate::statistics::Statistics;

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use parking_lot::Mutex;
use service::ptp::ClockState;

use self::rtp::{Sender, StreamHandle};

/// The running node: the synchronized clock and the handles of every
/// receive stream. The audio side pulls samples through the stream
/// handles with timestamps derived from [`Node::clock`].
pub struct Node {
    clock: Arc<ClockState>,
    streams: AHashMap<String, StreamHandle>,
    sender: Option<Arc<Sender>>,
}

impl Node {
    /// The PTP-slaved clock state.
    pub fn clock(&self) -> &Arc<ClockState> {
        &self.clock
    }

    /// The handle of a receive stream by its configured name.
    pub fn stream(&self, name: &str) -> Option<&StreamHandle> {
        self.streams.get(name)
    }

    pub fn streams(&self) -> impl Iterator<Item = (&String, &StreamHandle)> {
        self.streams.iter()
    }

    /// The transmit session, when one is configured.
    pub fn sender(&self) -> Option<&Arc<Sender>> {
        self.sender.as_ref()
    }
}

/// Starts every I/O task of the node: the PTP port, one RTP receive
/// task and one RTCP ingest task per configured stream, and the RTCP
/// emitter when a transmit session exists. Any socket that cannot be
/// opened fails the whole start.
pub async fn run(
    config: Arc<Config>,
    statistics: Statistics,
    observer: Arc<Observer>,
) -> anyhow::Result<Node> {
    let clock = Arc::new(ClockState::default());
    let interface = config.rtp.interface_address;

    ptp::run(&config, clock.clone(), observer.clone())?;

    let peers: rtcp::SharedPeerReports = Arc::new(Mutex::new(service::rtcp::PeerReports::new()));
    let mut streams = AHashMap::new();

    for stream_config in &config.streams {
        let description = stream_description(stream_config)?;
        statistics.register(&description.name);

        let handle = rtp::spawn_stream(
            description,
            config.rtp.jitter_buffer_frames,
            config.rtp.ground_value,
            interface,
            clock.clone(),
            observer.clone(),
            statistics.get_reporter(),
        )?;

        rtcp::spawn_ingest(&handle, interface, peers.clone(), statistics.get_reporter())?;

        log::info!(
            "rtp stream listening: name={}, group={}:{}",
            handle.description().name,
            handle.description().connection_address,
            handle.description().port,
        );

        streams.insert(handle.description().name.clone(), handle);
    }

    let sender = match &config.sender {
        Some(sender_config) => {
            let sender = Arc::new(Sender::new(
                sender_config.address,
                sender_config.port,
                sender_config.payload_type,
                sender_config.sample_rate,
                interface,
            )?);

            rtcp::spawn_emitter(
                sender.clone(),
                streams.values().cloned().collect(),
                interface,
                clock.clone(),
                peers.clone(),
                Duration::from_secs(config.rtcp.emit_interval_secs),
            )?;

            log::info!(
                "rtp sender ready: dst={}, ssrc={:#010x}",
                sender.destination(),
                sender.ssrc(),
            );

            Some(sender)
        }
        None => None,
    };

    Ok(Node {
        clock,
        streams,
        sender,
    })
}

/// Builds the stream description from a config entry; the same struct
/// arrives via SDP when streams come from discovery. Invalid entries
/// fail the start, nothing is opened for them.
fn stream_description(stream: &crate::config::Stream) -> anyhow::Result<StreamDescription> {
    if stream.channels == 0 {
        anyhow::bail!("stream {}: channel count must be non-zero", stream.name);
    }

    if stream.bits_per_sample != 16 && stream.bits_per_sample != 24 {
        anyhow::bail!(
            "stream {}: only L16 and L24 sample formats are supported",
            stream.name
        );
    }

    let source_filter = match &stream.source_filter {
        Some(line) => Some(crate::sdp::SourceFilter::parse(line)?),
        None => None,
    };

    Ok(StreamDescription {
        name: stream.name.clone(),
        connection_address: stream.address,
        port: stream.port,
        payload_type: stream.payload_type,
        sample_rate: stream.sample_rate,
        channels: stream.channels,
        bits_per_sample: stream.bits_per_sample,
        ssrc: stream.ssrc,
        source_filter,
        ..StreamDescription::default()
    })
}

use clap::Parser;
use serde::Deserialize;
use std::fs::read_to_string;
use std::net::Ipv4Addr;
#[cfg(feature = "api")]
use std::net::SocketAddr;

#[derive(Deserialize, Debug, Clone)]
pub struct Ptp {
    /// ptp domain number
    ///
    /// the clock domain this node participates in. AES67 media networks
    /// use domain 0 unless the network operator decided otherwise; all
    /// messages from other domains are ignored.
    #[serde(default = "Ptp::domain")]
    pub domain: u8,

    /// announce receipt timeout
    ///
    /// the number of announce intervals without an announce message
    /// after which the selected master is considered gone and the port
    /// drops back to listening. IEEE 1588 default is 3.
    #[serde(default = "Ptp::announce_receipt_timeout")]
    pub announce_receipt_timeout: u8,

    /// servo proportional gain
    ///
    /// the fraction of the filtered offset applied to the clock per
    /// sync. higher values converge faster but follow measurement noise
    /// more closely.
    #[serde(default = "Ptp::servo_gain")]
    pub servo_gain: f64,

    /// calibration threshold in nanoseconds
    ///
    /// the port reports itself calibrated once a full measurement
    /// window of offsets stayed within this magnitude.
    #[serde(default = "Ptp::calibrated_threshold_ns")]
    pub calibrated_threshold_ns: i64,

    /// step threshold in nanoseconds
    ///
    /// offsets beyond this magnitude step the clock in one jump instead
    /// of slewing, and restart calibration.
    #[serde(default = "Ptp::step_threshold_ns")]
    pub step_threshold_ns: i64,

    /// log2 of the peer delay request interval in seconds
    #[serde(default)]
    pub log_pdelay_req_interval: i8,
}

impl Ptp {
    fn domain() -> u8 {
        0
    }

    fn announce_receipt_timeout() -> u8 {
        3
    }

    fn servo_gain() -> f64 {
        service::ptp::DEFAULT_GAIN
    }

    fn calibrated_threshold_ns() -> i64 {
        service::ptp::DEFAULT_CALIBRATED_THRESHOLD_NS
    }

    fn step_threshold_ns() -> i64 {
        service::ptp::DEFAULT_STEP_THRESHOLD_NS
    }
}

impl Default for Ptp {
    fn default() -> Self {
        Self {
            domain: Self::domain(),
            announce_receipt_timeout: Self::announce_receipt_timeout(),
            servo_gain: Self::servo_gain(),
            calibrated_threshold_ns: Self::calibrated_threshold_ns(),
            step_threshold_ns: Self::step_threshold_ns(),
            log_pdelay_req_interval: 0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Rtp {
    /// receive interface address
    ///
    /// the address of the interface multicast groups are joined on.
    /// 0.0.0.0 lets the kernel pick the default interface.
    #[serde(default = "Rtp::interface_address")]
    pub interface_address: Ipv4Addr,

    /// jitter buffer depth in frames
    ///
    /// the ring buffer holds this many frames per stream. with the
    /// AES67 default of 48 kHz and 1 ms packets, 768 frames buffer
    /// 16 packets.
    #[serde(default = "Rtp::jitter_buffer_frames")]
    pub jitter_buffer_frames: usize,

    /// ground value byte
    ///
    /// unwritten and erased regions of the jitter buffer read as this
    /// byte. 0 is digital silence for linear PCM.
    #[serde(default)]
    pub ground_value: u8,
}

impl Rtp {
    fn interface_address() -> Ipv4Addr {
        Ipv4Addr::UNSPECIFIED
    }

    fn jitter_buffer_frames() -> usize {
        768
    }
}

impl Default for Rtp {
    fn default() -> Self {
        Self {
            interface_address: Self::interface_address(),
            jitter_buffer_frames: Self::jitter_buffer_frames(),
            ground_value: 0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Rtcp {
    /// sender report interval in seconds
    #[serde(default = "Rtcp::emit_interval_secs")]
    pub emit_interval_secs: u64,
}

impl Rtcp {
    fn emit_interval_secs() -> u64 {
        5
    }
}

impl Default for Rtcp {
    fn default() -> Self {
        Self {
            emit_interval_secs: Self::emit_interval_secs(),
        }
    }
}

/// A configured receive stream. The same parameters arrive via SDP when
/// streams are set up from discovery; this section exists for static
/// setups and tests.
#[derive(Deserialize, Debug, Clone)]
pub struct Stream {
    /// stream name, used as the statistics key
    pub name: String,

    /// multicast group carrying the stream
    pub address: Ipv4Addr,

    /// rtp port of the stream
    pub port: u16,

    /// rtp payload type, dynamic 96-127 for AES67
    #[serde(default = "Stream::payload_type")]
    pub payload_type: u8,

    /// audio sample rate
    #[serde(default = "Stream::sample_rate")]
    pub sample_rate: u32,

    /// channel count
    #[serde(default = "Stream::channels")]
    pub channels: u8,

    /// bits per sample, 16 or 24
    #[serde(default = "Stream::bits_per_sample")]
    pub bits_per_sample: u8,

    /// only accept packets with this ssrc
    #[serde(default)]
    pub ssrc: Option<u32>,

    /// source filter line as it would appear in SDP,
    /// e.g. "incl IN IP4 239.3.8.1 192.168.16.52"
    #[serde(default)]
    pub source_filter: Option<String>,
}

impl Stream {
    fn payload_type() -> u8 {
        97
    }

    fn sample_rate() -> u32 {
        48000
    }

    fn channels() -> u8 {
        2
    }

    fn bits_per_sample() -> u8 {
        24
    }
}

/// An optional transmit session. When present the node sends RTP from
/// [`crate::server::rtp::Sender`] and emits RTCP sender reports for it.
#[derive(Deserialize, Debug, Clone)]
pub struct Sender {
    /// multicast group to send to
    pub address: Ipv4Addr,

    /// rtp port to send to
    pub port: u16,

    /// rtp payload type
    #[serde(default = "Stream::payload_type")]
    pub payload_type: u8,

    /// audio sample rate
    #[serde(default = "Stream::sample_rate")]
    pub sample_rate: u32,
}

#[cfg(feature = "api")]
#[derive(Deserialize, Debug, Clone)]
pub struct Api {
    /// api server bind address
    ///
    /// Warn: the http server does not contain any means of
    /// authentication; do not expose it directly to an unsafe
    /// environment.
    #[serde(default = "Api::listen")]
    pub listen: SocketAddr,
}

#[cfg(feature = "api")]
impl Api {
    fn listen() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 3000))
    }
}

#[cfg(feature = "api")]
impl Default for Api {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Log {
    /// log level
    ///
    /// An enum representing the available verbosity levels of the
    /// logger.
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub ptp: Ptp,
    #[serde(default)]
    pub rtp: Rtp,
    #[serde(default)]
    pub rtcp: Rtcp,
    #[cfg(feature = "api")]
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub log: Log,

    /// statically configured receive streams
    #[serde(default)]
    pub streams: Vec<Stream>,

    /// optional transmit session
    #[serde(default)]
    pub sender: Option<Sender>,
}

#[derive(Parser)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    /// specify the configuration file path.
    #[arg(long)]
    config: Option<String>,
}

impl Config {
    /// Load command line parameters. If a configuration file path is
    /// specified the configuration is read from that file, otherwise
    /// the defaults are used.
    pub fn load() -> anyhow::Result<Self> {
        let cli = Cli::parse();
        let cfg_str = match cli.config {
            Some(path) => read_to_string(path)?,
            None => String::new(),
        };

        Ok(toml::from_str(&cfg_str)?)
    }
}

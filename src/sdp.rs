//! The receive-relevant subset of SDP. Full session descriptions are the
//! business of the discovery collaborators; only the fields a receiver
//! needs to join and validate a stream cross this boundary: connection
//! address, RTP port, payload format, packet time, source filter and
//! DUP grouping.

use std::net::{IpAddr, Ipv4Addr};

use anyhow::{Context, anyhow};

/// Everything a receiver needs to know about one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    /// The session name from `s=`.
    pub name: String,
    /// The multicast group from `c=`.
    pub connection_address: Ipv4Addr,
    /// The RTP port from `m=audio`.
    pub port: u16,
    /// The (usually dynamic) payload type from `m=audio`.
    pub payload_type: u8,
    /// Sample rate from `a=rtpmap`.
    pub sample_rate: u32,
    /// Channel count from `a=rtpmap`.
    pub channels: u8,
    /// 24 for L24, 16 for L16.
    pub bits_per_sample: u8,
    /// Packet time from `a=ptime`, in microseconds.
    pub packet_time_us: u32,
    /// Accept only this SSRC when set.
    pub ssrc: Option<u32>,
    /// Source address filter from `a=source-filter`.
    pub source_filter: Option<SourceFilter>,
    /// Media identifiers of redundant legs from `a=group:DUP`.
    pub duplicate_group: Vec<String>,
}

impl Default for StreamDescription {
    fn default() -> Self {
        Self {
            name: String::new(),
            connection_address: Ipv4Addr::UNSPECIFIED,
            port: 5004,
            payload_type: 97,
            sample_rate: 48000,
            channels: 2,
            bits_per_sample: 24,
            packet_time_us: 1000,
            ssrc: None,
            source_filter: None,
            duplicate_group: Vec::new(),
        }
    }
}

impl StreamDescription {
    /// The size of one frame (one sample for every channel) in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// The number of frames per packet implied by the packet time.
    pub fn frames_per_packet(&self) -> usize {
        (self.sample_rate as u64 * self.packet_time_us as u64 / 1_000_000) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Include,
    Exclude,
}

/// A source filter per RFC 4570: an include list admits only the listed
/// source addresses, an exclude list admits everything else. The filter
/// also pins the destination (connection) address it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFilter {
    pub mode: FilterMode,
    pub connection_address: IpAddr,
    pub sources: Vec<IpAddr>,
}

impl SourceFilter {
    /// Parses the value of an `a=source-filter:` attribute, e.g.
    /// ` incl IN IP4 239.3.8.1 192.168.16.52`.
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        let mut parts = value.split_whitespace();

        let mode = match parts.next() {
            Some("incl") => FilterMode::Include,
            Some("excl") => FilterMode::Exclude,
            other => return Err(anyhow!("unknown source filter mode: {:?}", other)),
        };

        let nettype = parts.next();
        if nettype != Some("IN") {
            return Err(anyhow!("unknown source filter nettype: {:?}", nettype));
        }

        let addrtype = parts.next();
        if addrtype != Some("IP4") && addrtype != Some("IP6") {
            return Err(anyhow!("unknown source filter addrtype: {:?}", addrtype));
        }

        let connection_address = parts
            .next()
            .context("source filter without destination address")?
            .parse::<IpAddr>()?;

        let sources = parts
            .map(|s| s.parse::<IpAddr>())
            .collect::<Result<Vec<_>, _>>()?;
        if sources.is_empty() {
            return Err(anyhow!("source filter without source addresses"));
        }

        Ok(Self {
            mode,
            connection_address,
            sources,
        })
    }

    /// Whether a packet from the given source to the given destination
    /// passes the filter.
    pub fn is_valid_source(&self, destination: IpAddr, source: IpAddr) -> bool {
        if destination != self.connection_address {
            return false;
        }

        match self.mode {
            FilterMode::Include => self.sources.contains(&source),
            FilterMode::Exclude => !self.sources.contains(&source),
        }
    }
}

/// Parses the receive-relevant fields out of a session description.
/// Unknown lines are skipped; the grammar beyond these fields is not
/// this crate's business.
pub fn parse_stream_description(sdp: &str) -> anyhow::Result<StreamDescription> {
    let mut description = StreamDescription::default();
    let mut seen_media = false;

    for line in sdp.lines() {
        let line = line.trim();

        if let Some(name) = line.strip_prefix("s=") {
            description.name = name.to_string();
        } else if let Some(connection) = line.strip_prefix("c=") {
            // c=IN IP4 <multicast-address>/<ttl>
            let address = connection
                .split_whitespace()
                .nth(2)
                .and_then(|part| part.split('/').next())
                .context("malformed connection line")?;
            description.connection_address = address.parse()?;
        } else if let Some(media) = line.strip_prefix("m=audio ") {
            // m=audio <port> RTP/AVP <payload-type>
            seen_media = true;
            let mut parts = media.split_whitespace();
            description.port = parts.next().context("media line without port")?.parse()?;
            if let Some(payload_type) = parts.nth(1) {
                description.payload_type = payload_type.parse()?;
            }
        } else if let Some(rtpmap) = line.strip_prefix("a=rtpmap:") {
            // a=rtpmap:<payload> L24/<sample-rate>/<channels>
            let mut parts = rtpmap.split('/');
            let encoding = parts.next().unwrap_or_default();
            description.bits_per_sample = if encoding.ends_with("L16") { 16 } else { 24 };
            if let Some(rate) = parts.next() {
                description.sample_rate = rate.parse()?;
            }
            if let Some(channels) = parts.next() {
                description.channels = channels.parse()?;
            }
        } else if let Some(ptime) = line.strip_prefix("a=ptime:") {
            // a=ptime:<ms>
            let ptime_ms: f64 = ptime.parse()?;
            description.packet_time_us = (ptime_ms * 1000.0) as u32;
        } else if let Some(filter) = line.strip_prefix("a=source-filter:") {
            description.source_filter = Some(SourceFilter::parse(filter)?);
        } else if let Some(group) = line.strip_prefix("a=group:DUP ") {
            description.duplicate_group =
                group.split_whitespace().map(str::to_string).collect();
        } else if let Some(ssrc) = line.strip_prefix("a=ssrc:") {
            if let Some(value) = ssrc.split_whitespace().next() {
                description.ssrc = value.parse().ok();
            }
        }
    }

    if !seen_media {
        return Err(anyhow!("session description without an audio media line"));
    }

    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDP: &str = "v=0\r\n\
        o=- 9 0 IN IP4 192.168.16.52\r\n\
        s=Studio Main L/R\r\n\
        c=IN IP4 239.3.8.1/32\r\n\
        t=0 0\r\n\
        a=group:DUP primary secondary\r\n\
        m=audio 5004 RTP/AVP 98\r\n\
        a=rtpmap:98 L24/48000/2\r\n\
        a=ptime:1\r\n\
        a=source-filter: incl IN IP4 239.3.8.1 192.168.16.52\r\n";

    #[test]
    fn parses_receive_relevant_fields() {
        let description = parse_stream_description(SDP).unwrap();

        assert_eq!(description.name, "Studio Main L/R");
        assert_eq!(description.connection_address, "239.3.8.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(description.port, 5004);
        assert_eq!(description.payload_type, 98);
        assert_eq!(description.sample_rate, 48000);
        assert_eq!(description.channels, 2);
        assert_eq!(description.bits_per_sample, 24);
        assert_eq!(description.packet_time_us, 1000);
        assert_eq!(description.frame_bytes(), 6);
        assert_eq!(description.frames_per_packet(), 48);
        assert_eq!(description.duplicate_group, vec!["primary", "secondary"]);
    }

    #[test]
    fn include_filter_admits_only_listed_sources() {
        let description = parse_stream_description(SDP).unwrap();
        let filter = description.source_filter.unwrap();

        let destination: IpAddr = "239.3.8.1".parse().unwrap();
        assert!(filter.is_valid_source(destination, "192.168.16.52".parse().unwrap()));
        assert!(!filter.is_valid_source(destination, "192.168.16.53".parse().unwrap()));
        assert!(!filter.is_valid_source("239.3.8.2".parse().unwrap(), "192.168.16.52".parse().unwrap()));
    }

    #[test]
    fn exclude_filter_admits_everything_else() {
        let filter = SourceFilter::parse(" excl IN IP4 239.3.8.1 192.168.16.52").unwrap();

        let destination: IpAddr = "239.3.8.1".parse().unwrap();
        assert!(!filter.is_valid_source(destination, "192.168.16.52".parse().unwrap()));
        assert!(filter.is_valid_source(destination, "192.168.16.53".parse().unwrap()));
    }
}

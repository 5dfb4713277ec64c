//! Data model of the DNS-SD discovery boundary. The actual browser
//! lives with the runtime; these are the resolved descriptors crossing
//! into the core and its subscribers.

use std::collections::BTreeMap;
use std::net::IpAddr;

/// The service type RAVENNA sessions are advertised under.
pub const RAVENNA_SESSION_REG_TYPE: &str = "_ravenna._sub._rtsp._tcp.local.";

/// The service type NMOS nodes are advertised under.
pub const NMOS_NODE_REG_TYPE: &str = "_nmos-node._tcp.local.";

/// A resolved DNS-SD service.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ServiceDescription {
    /// The instance name of the service.
    pub name: String,
    /// The service type (i.e. `_rtsp._tcp.`).
    pub reg_type: String,
    /// The target host advertised in the SRV record.
    pub host_target: String,
    pub port: u16,
    /// The key/value pairs of the TXT record.
    pub txt: BTreeMap<String, String>,
    /// The addresses the service was seen on.
    pub addresses: Vec<IpAddr>,
}

impl std::fmt::Display for ServiceDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) at {}:{}",
            self.name, self.reg_type, self.host_target, self.port
        )
    }
}

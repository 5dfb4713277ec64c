#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod discovery;
pub mod observer;
pub mod sdp;
pub mod server;
pub mod statistics;

use std::sync::Arc;

use config::Config;
use observer::Observer;
use server::Node;
use statistics::Statistics;

/// A started node with everything that keeps it alive: the stream and
/// clock handles, the event observer and the discovery daemon. Dropping
/// this stops discovery; the I/O tasks run until the runtime shuts
/// down.
pub struct RavennaNode {
    node: Arc<Node>,
    observer: Arc<Observer>,
    _daemon: mdns_sd::ServiceDaemon,
}

impl RavennaNode {
    /// The node handle the audio side pulls samples through.
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Subscribe to node events.
    pub fn observer(&self) -> &Arc<Observer> {
        &self.observer
    }
}

/// Composes and starts a node from its configuration: the PTP port, the
/// configured receive streams, discovery and the status API.
///
/// Also callable from integration tests and embedding applications
/// instead of the binary's main function.
pub async fn node_main(config: Arc<Config>) -> anyhow::Result<RavennaNode> {
    let statistics = Statistics::default();
    let observer = Arc::new(Observer::default());

    let node = Arc::new(server::run(config.clone(), statistics.clone(), observer.clone()).await?);
    let daemon = discovery::run(observer.clone())?;

    #[cfg(feature = "api")]
    api::start(&config, node.clone(), statistics).await?;

    Ok(RavennaNode {
        node,
        observer,
        _daemon: daemon,
    })
}

use codec::ptp::PortIdentity;
use service::NodeObserver;
use service::discovery::ServiceDescription;
use service::{ptp, rtp};

use tokio::sync::broadcast;

/// A node event as delivered to external subscribers.
///
/// Events are fanned out over a broadcast channel: every subscriber
/// iterates its own snapshot of the queue, so subscribers can come and
/// go from inside their own event handling without affecting the
/// delivery to others, and the node never runs subscriber code while
/// holding its own state.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    PtpStateChanged(ptp::State),
    PtpCalibratedChanged(bool),
    PtpBestMasterChanged(Option<PortIdentity>),
    RtpStreamStatsUpdated {
        stream: String,
        counters: rtp::Counters,
    },
    ServiceDiscovered(ServiceDescription),
    ServiceResolved(ServiceDescription),
    ServiceRemoved(ServiceDescription),
}

/// The node's event observer: logs every transition and forwards it to
/// the subscriber channel.
pub struct Observer {
    events: broadcast::Sender<NodeEvent>,
}

impl Default for Observer {
    fn default() -> Self {
        let (events, _) = broadcast::channel(256);
        Self { events }
    }
}

impl Observer {
    /// Subscribe to node events. A receiver that falls behind misses
    /// the oldest events, it is never blocked on.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: NodeEvent) {
        // Send only fails when no subscriber exists, which is fine.
        let _ = self.events.send(event);
    }
}

impl NodeObserver for Observer {
    fn ptp_state_changed(&self, state: ptp::State) {
        log::info!("ptp state changed: state={:?}", state);
        self.publish(NodeEvent::PtpStateChanged(state));
    }

    fn ptp_calibrated_changed(&self, calibrated: bool) {
        log::info!("ptp calibrated changed: calibrated={}", calibrated);
        self.publish(NodeEvent::PtpCalibratedChanged(calibrated));
    }

    fn ptp_best_master_changed(&self, identity: Option<PortIdentity>) {
        match &identity {
            Some(identity) => log::info!("ptp best master changed: master={}", identity),
            None => log::info!("ptp best master lost"),
        }
        self.publish(NodeEvent::PtpBestMasterChanged(identity));
    }

    fn rtp_stream_stats_updated(&self, stream: &str, counters: &rtp::Counters) {
        log::debug!("rtp stream stats: stream={}, {}", stream, counters);
        self.publish(NodeEvent::RtpStreamStatsUpdated {
            stream: stream.to_string(),
            counters: *counters,
        });
    }

    fn service_discovered(&self, description: &ServiceDescription) {
        log::info!("service discovered: {}", description);
        self.publish(NodeEvent::ServiceDiscovered(description.clone()));
    }

    fn service_resolved(&self, description: &ServiceDescription) {
        log::info!("service resolved: {}", description);
        self.publish(NodeEvent::ServiceResolved(description.clone()));
    }

    fn service_removed(&self, description: &ServiceDescription) {
        log::info!("service removed: {}", description);
        self.publish(NodeEvent::ServiceRemoved(description.clone()));
    }
}

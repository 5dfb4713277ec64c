use crate::config::Config;
use crate::observer::Observer;

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use codec::ptp::{self, PortIdentity};
use service::NodeObserver;
use service::ptp::{ClockState, Port, PortAction, PortConfig, State};
use tokio::net::UdpSocket;

/// Re-arm value used while no master is tracked; the timer is parked
/// far in the future instead of being torn down.
const PARKED_TIMEOUT: Duration = Duration::from_secs(3600);

/// Opens the PTP event and general sockets on the configured interface
/// and spawns the port task. A bind failure at startup is surfaced to
/// the caller; the node never partially starts.
pub fn run(config: &Config, clock: Arc<ClockState>, observer: Arc<Observer>) -> anyhow::Result<()> {
    let port_config = PortConfig {
        domain: config.ptp.domain,
        announce_receipt_timeout: config.ptp.announce_receipt_timeout,
        servo_gain: config.ptp.servo_gain,
        step_threshold_ns: config.ptp.step_threshold_ns,
        calibrated_threshold_ns: config.ptp.calibrated_threshold_ns,
        log_pdelay_req_interval: config.ptp.log_pdelay_req_interval,
    };

    let identity = PortIdentity {
        clock_identity: Port::generate_identity(),
        port_number: 1,
    };

    let mut port = Port::new(port_config, identity, clock);

    let interface = config.rtp.interface_address;
    let sockets = open_ptp_socket(ptp::EVENT_PORT, interface)
        .context("open ptp event socket")
        .and_then(|event| {
            let general =
                open_ptp_socket(ptp::GENERAL_PORT, interface).context("open ptp general socket")?;
            Ok((event, general))
        });

    let (event, general) = match sockets {
        Ok(sockets) => sockets,
        Err(e) => {
            port.fault();
            observer.ptp_state_changed(port.state());
            return Err(e);
        }
    };

    port.started();
    observer.ptp_state_changed(port.state());

    log::info!(
        "ptp port listening: identity={}, domain={}, interface={}",
        identity,
        config.ptp.domain,
        interface
    );

    tokio::spawn(port_task(port, event, general, observer));
    Ok(())
}

/// The port's event loop: both sockets, the announce receipt timer and
/// the peer delay request interval, all feeding the sans-IO port.
async fn port_task(
    mut port: Port,
    event: UdpSocket,
    general: UdpSocket,
    observer: Arc<Observer>,
) {
    let group = Ipv4Addr::from(ptp::PRIMARY_MULTICAST_ADDR);
    let event_target = SocketAddr::V4(SocketAddrV4::new(group, ptp::EVENT_PORT));
    let general_target = SocketAddr::V4(SocketAddrV4::new(group, ptp::GENERAL_PORT));

    let announce_timer = tokio::time::sleep(PARKED_TIMEOUT);
    tokio::pin!(announce_timer);
    let mut pdelay_timer = tokio::time::interval(port.pdelay_interval());

    let mut event_buf = vec![0u8; 512];
    let mut general_buf = vec![0u8; 512];

    loop {
        let before = snapshot(&port);

        let actions = tokio::select! {
            received = event.recv_from(&mut event_buf) => match received {
                Ok((size, _)) => {
                    let rx_ns = ClockState::local_unix_ns();
                    port.handle_datagram(&event_buf[..size], rx_ns)
                }
                Err(e) => {
                    log::warn!("ptp event socket receive error: err={:?}", e);
                    continue;
                }
            },
            received = general.recv_from(&mut general_buf) => match received {
                Ok((size, _)) => {
                    let rx_ns = ClockState::local_unix_ns();
                    port.handle_datagram(&general_buf[..size], rx_ns)
                }
                Err(e) => {
                    log::warn!("ptp general socket receive error: err={:?}", e);
                    continue;
                }
            },
            _ = &mut announce_timer => {
                log::warn!("ptp announce receipt timeout, dropping master");
                port.handle_announce_timeout();
                announce_timer.as_mut().reset(tokio::time::Instant::now() + PARKED_TIMEOUT);
                Vec::new()
            }
            _ = pdelay_timer.tick() => {
                port.handle_pdelay_timer(ClockState::local_unix_ns())
            }
        };

        for action in actions {
            match action {
                PortAction::SendEvent(bytes) => {
                    if let Err(e) = event.send_to(&bytes, event_target).await {
                        log::warn!("ptp event socket send error: err={:?}", e);
                    }
                }
                PortAction::SendGeneral(bytes) => {
                    if let Err(e) = general.send_to(&bytes, general_target).await {
                        log::warn!("ptp general socket send error: err={:?}", e);
                    }
                }
                PortAction::ResetAnnounceTimer(timeout) => {
                    announce_timer
                        .as_mut()
                        .reset(tokio::time::Instant::now() + timeout);
                }
            }
        }

        notify_changes(&port, before, &observer);
    }
}

/// The observable side of the port, compared around every event to fire
/// subscriber callbacks outside the core.
#[derive(PartialEq, Eq, Clone, Copy)]
struct Snapshot {
    state: State,
    calibrated: bool,
    master: Option<PortIdentity>,
}

fn snapshot(port: &Port) -> Snapshot {
    Snapshot {
        state: port.state(),
        calibrated: port.clock().calibrated(),
        master: port.best_master().map(|master| master.port_identity),
    }
}

fn notify_changes(port: &Port, before: Snapshot, observer: &Arc<Observer>) {
    let after = snapshot(port);

    if after.state != before.state {
        observer.ptp_state_changed(after.state);
    }
    if after.calibrated != before.calibrated {
        observer.ptp_calibrated_changed(after.calibrated);
    }
    if after.master != before.master {
        observer.ptp_best_master_changed(after.master);
    }
}

/// Opens one of the two PTP sockets: reusable, joined on the primary
/// multicast group, loopback off, TTL 1 and expedited forwarding
/// requested.
fn open_ptp_socket(port: u16, interface: Ipv4Addr) -> anyhow::Result<UdpSocket> {
    use socket2::{Domain, Protocol, Socket, Type};

    let group = Ipv4Addr::from(ptp::PRIMARY_MULTICAST_ADDR);
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;
    socket.join_multicast_v4(&group, &interface)?;
    socket.set_multicast_loop_v4(false)?;
    socket.set_multicast_ttl_v4(1)?;

    // DSCP 56; best effort, some platforms refuse plain IP_TOS.
    if let Err(e) = socket.set_tos(56 << 2) {
        log::debug!("ptp socket set_tos failed: err={:?}", e);
    }

    socket.set_nonblocking(true)?;
    Ok(UdpSocket::from_std(socket.into())?)
}

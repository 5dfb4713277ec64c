//! DNS-SD browsing for RAVENNA sessions and NMOS nodes.
//!
//! The browser is an external collaborator of the receive core: it
//! surfaces resolved service descriptors through the observer and keeps
//! no state the core depends on.

use crate::observer::Observer;

use std::sync::Arc;

use anyhow::Context;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use service::NodeObserver;
use service::discovery::{NMOS_NODE_REG_TYPE, RAVENNA_SESSION_REG_TYPE, ServiceDescription};

/// Starts browsing for the RAVENNA and NMOS service types. The daemon
/// handle keeps the browse alive; dropping it stops discovery.
pub fn run(observer: Arc<Observer>) -> anyhow::Result<ServiceDaemon> {
    let daemon = ServiceDaemon::new().context("start mdns daemon")?;

    for reg_type in [RAVENNA_SESSION_REG_TYPE, NMOS_NODE_REG_TYPE] {
        let receiver = daemon
            .browse(reg_type)
            .with_context(|| format!("browse {}", reg_type))?;
        let observer = observer.clone();

        tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                match event {
                    ServiceEvent::ServiceFound(reg_type, fullname) => {
                        observer.service_discovered(&ServiceDescription {
                            name: fullname,
                            reg_type,
                            ..ServiceDescription::default()
                        });
                    }
                    ServiceEvent::ServiceResolved(info) => {
                        observer.service_resolved(&to_description(&info));
                    }
                    ServiceEvent::ServiceRemoved(reg_type, fullname) => {
                        observer.service_removed(&ServiceDescription {
                            name: fullname,
                            reg_type,
                            ..ServiceDescription::default()
                        });
                    }
                    other => {
                        log::trace!("mdns event: {:?}", other);
                    }
                }
            }
        });

        log::info!("mdns browsing: reg_type={}", reg_type);
    }

    Ok(daemon)
}

fn to_description(info: &ServiceInfo) -> ServiceDescription {
    ServiceDescription {
        name: info.get_fullname().to_string(),
        reg_type: info.get_type().to_string(),
        host_target: info.get_hostname().to_string(),
        port: info.get_port(),
        txt: info
            .get_properties()
            .iter()
            .map(|property| (property.key().to_string(), property.val_str().to_string()))
            .collect(),
        addresses: info.get_addresses().iter().copied().collect(),
    }
}

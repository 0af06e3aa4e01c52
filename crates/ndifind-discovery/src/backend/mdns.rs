//! Multicast DNS backend.
//!
//! NDI senders announce themselves as `_ndi._tcp.local.` services whose
//! instance names follow the `MACHINE (STREAM)` convention. Group membership
//! is announced through DNS-SD subtypes, so a group filter browses
//! `_<group>._sub._ndi._tcp.local.` for each requested group.

use super::{BackendSession, BackendSettings, DiscoveryBackend};
use crate::error::{DiscoveryError, Result};
use crate::types::RawSource;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info, warn};

/// DNS-SD service type announced by NDI senders
pub const NDI_SERVICE_TYPE: &str = "_ndi._tcp.local.";

/// Backend that browses the local network with an `mdns-sd` daemon.
#[derive(Debug, Clone, Default)]
pub struct MdnsBackend {
    local_host: Option<String>,
}

impl MdnsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the host name used to recognise local sources.
    pub fn with_local_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = Some(host.into());
        self
    }
}

impl DiscoveryBackend for MdnsBackend {
    fn open(&self, settings: &BackendSettings) -> Result<Box<dyn BackendSession>> {
        let daemon = ServiceDaemon::new().map_err(|e| {
            DiscoveryError::BackendUnavailable(format!("Failed to create mDNS daemon: {}", e))
        })?;

        let mut receivers = Vec::new();
        for service_type in browse_types(settings.groups.as_deref()) {
            match daemon.browse(&service_type) {
                Ok(receiver) => {
                    debug!(service_type = %service_type, "Browsing");
                    receivers.push(receiver);
                }
                Err(e) => {
                    shut_down(&daemon);
                    return Err(DiscoveryError::BackendUnavailable(format!(
                        "Failed to browse for service type '{}': {}",
                        service_type, e
                    )));
                }
            }
        }

        if let Some(extra_ips) = &settings.extra_ips {
            warn!(
                extra_ips = extra_ips.as_str(),
                "Multicast DNS cannot query unicast hosts, extra addresses are ignored"
            );
        }

        let local_host = if settings.show_local_sources {
            None
        } else {
            self.local_host.clone().or_else(local_hostname)
        };

        info!(
            browsers = receivers.len(),
            hide_local = local_host.as_deref().unwrap_or("-"),
            "mDNS discovery session opened"
        );

        Ok(Box::new(MdnsSession {
            daemon,
            receivers,
            table: SourceTable::new(local_host),
        }))
    }
}

struct MdnsSession {
    daemon: ServiceDaemon,
    receivers: Vec<flume::Receiver<ServiceEvent>>,
    table: SourceTable,
}

impl BackendSession for MdnsSession {
    fn wait(&mut self, timeout: Duration) -> Result<bool> {
        let first = match next_event(&self.receivers, timeout)? {
            Some(event) => event,
            None => return Ok(false),
        };

        let mut changed = self.table.apply(first);

        // Drain the rest of a burst so it lands in a single cycle
        for receiver in &self.receivers {
            while let Ok(event) = receiver.try_recv() {
                changed |= self.table.apply(event);
            }
        }

        Ok(changed)
    }

    fn snapshot(&mut self) -> Result<Vec<RawSource>> {
        Ok(self.table.sources())
    }

    fn close(&mut self) -> Result<()> {
        self.daemon
            .shutdown()
            .map(|_| ())
            .map_err(|e| DiscoveryError::backend("close", e.to_string()))
    }
}

/// Stops a daemon on a path that is already failing; errors are only logged.
fn shut_down(daemon: &ServiceDaemon) -> bool {
    match daemon.shutdown() {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Failed to shut down mDNS daemon");
            false
        }
    }
}

fn next_event(
    receivers: &[flume::Receiver<ServiceEvent>],
    timeout: Duration,
) -> Result<Option<ServiceEvent>> {
    let mut selector = flume::Selector::new();
    for receiver in receivers {
        selector = selector.recv(receiver, |event| event);
    }

    match selector.wait_timeout(timeout) {
        Ok(Ok(event)) => Ok(Some(event)),
        Ok(Err(_)) => Err(DiscoveryError::backend(
            "wait",
            "mDNS daemon channel disconnected",
        )),
        Err(_) => Ok(None),
    }
}

/// Service types to browse for an optional comma-delimited group list.
fn browse_types(groups: Option<&str>) -> Vec<String> {
    let subtypes: Vec<String> = groups
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(|group| format!("_{}._sub.{}", group.to_lowercase(), NDI_SERVICE_TYPE))
        .collect();

    if subtypes.is_empty() {
        vec![NDI_SERVICE_TYPE.to_string()]
    } else {
        subtypes
    }
}

fn local_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Resolved services keyed by full DNS-SD name.
struct SourceTable {
    local_host: Option<String>,
    sources: BTreeMap<String, RawSource>,
}

impl SourceTable {
    fn new(local_host: Option<String>) -> Self {
        Self {
            local_host: local_host.map(|host| short_host(&host).to_string()),
            sources: BTreeMap::new(),
        }
    }

    /// Applies one daemon event. Returns whether the visible set changed.
    fn apply(&mut self, event: ServiceEvent) -> bool {
        match event {
            ServiceEvent::ServiceResolved(info) => {
                let fullname = info.get_fullname().to_string();

                if self.is_local(&info) {
                    debug!(service = %fullname, "Hiding local source");
                    return self.sources.remove(&fullname).is_some();
                }

                let raw = to_raw_source(&info);
                debug!(
                    service = %fullname,
                    address = %raw.address,
                    "Service resolved"
                );
                self.sources.insert(fullname, raw.clone()) != Some(raw)
            }

            ServiceEvent::ServiceRemoved(typ, fullname) => {
                debug!(service = %fullname, typ = %typ, "Service removed");
                self.sources.remove(&fullname).is_some()
            }

            ServiceEvent::SearchStarted(typ) => {
                debug!(typ = %typ, "Search started");
                false
            }

            ServiceEvent::SearchStopped(typ) => {
                debug!(typ = %typ, "Search stopped");
                false
            }

            _ => false,
        }
    }

    fn sources(&self) -> Vec<RawSource> {
        self.sources.values().cloned().collect()
    }

    fn is_local(&self, info: &ServiceInfo) -> bool {
        let Some(local) = &self.local_host else {
            return false;
        };

        if short_host(info.get_hostname()).eq_ignore_ascii_case(local) {
            return true;
        }

        let name = instance_name(info.get_fullname());
        name.split_once(" (")
            .map(|(machine, _)| machine.eq_ignore_ascii_case(local))
            .unwrap_or(false)
    }
}

fn to_raw_source(info: &ServiceInfo) -> RawSource {
    let addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();

    // Prefer IPv4 addresses
    let primary = addresses
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addresses.first())
        .copied();

    let address = match primary {
        Some(ip) => SocketAddr::new(ip, info.get_port()).to_string(),
        None => format!("{}:{}", short_host(info.get_hostname()), info.get_port()),
    };

    RawSource::new(instance_name(info.get_fullname()), address)
}

/// `STUDIO-PC (Camera 1)._ndi._tcp.local.` -> `STUDIO-PC (Camera 1)`
fn instance_name(fullname: &str) -> &str {
    fullname
        .strip_suffix(NDI_SERVICE_TYPE)
        .and_then(|name| name.strip_suffix('.'))
        .unwrap_or(fullname)
}

/// `studio-pc.local.` -> `studio-pc`
fn short_host(host: &str) -> &str {
    let host = host.trim_end_matches('.');
    host.strip_suffix(".local").unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn service(instance: &str, host: &str, ip: &str, port: u16) -> ServiceInfo {
        ServiceInfo::new(
            NDI_SERVICE_TYPE,
            instance,
            host,
            ip,
            port,
            HashMap::<String, String>::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_browse_types() {
        assert_eq!(browse_types(None), vec![NDI_SERVICE_TYPE]);
        assert_eq!(browse_types(Some("")), vec![NDI_SERVICE_TYPE]);
        assert_eq!(
            browse_types(Some("Public,studio-b")),
            vec![
                "_public._sub._ndi._tcp.local.",
                "_studio-b._sub._ndi._tcp.local."
            ]
        );
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(
            instance_name("STUDIO-PC (Camera 1)._ndi._tcp.local."),
            "STUDIO-PC (Camera 1)"
        );
        assert_eq!(instance_name("odd-name"), "odd-name");
        assert_eq!(short_host("studio-pc.local."), "studio-pc");
        assert_eq!(short_host("studio-pc"), "studio-pc");
    }

    #[test]
    fn test_resolve_and_remove() {
        let mut table = SourceTable::new(None);
        let info = service("STUDIO-PC (Camera 1)", "studio-pc.local.", "192.168.1.20", 5961);
        let fullname = info.get_fullname().to_string();

        assert!(table.apply(ServiceEvent::ServiceResolved(info.clone())));
        assert!(!table.apply(ServiceEvent::ServiceResolved(info)));
        assert_eq!(
            table.sources(),
            vec![RawSource::new("STUDIO-PC (Camera 1)", "192.168.1.20:5961")]
        );

        assert!(table.apply(ServiceEvent::ServiceRemoved(
            NDI_SERVICE_TYPE.to_string(),
            fullname.clone()
        )));
        assert!(!table.apply(ServiceEvent::ServiceRemoved(
            NDI_SERVICE_TYPE.to_string(),
            fullname
        )));
        assert!(table.sources().is_empty());
    }

    #[test]
    fn test_local_sources_hidden() {
        let mut table = SourceTable::new(Some("studio-pc.local.".to_string()));

        let by_host = service("OTHER (Cam)", "Studio-PC.local.", "192.168.1.20", 5961);
        let by_name = service("STUDIO-PC (Cam)", "elsewhere.local.", "192.168.1.21", 5961);
        let remote = service("REMOTE (Cam)", "remote.local.", "192.168.1.30", 5961);

        assert!(!table.apply(ServiceEvent::ServiceResolved(by_host)));
        assert!(!table.apply(ServiceEvent::ServiceResolved(by_name)));
        assert!(table.apply(ServiceEvent::ServiceResolved(remote)));
        assert_eq!(table.sources().len(), 1);
        assert_eq!(table.sources()[0].name, "REMOTE (Cam)");
    }

    #[test]
    fn test_shut_down_stopped_daemon_is_logged() {
        // Needs a loopback socket; nothing to check where that is unavailable
        let Ok(daemon) = ServiceDaemon::new() else {
            return;
        };

        assert!(shut_down(&daemon));

        // The command channel is gone once the daemon has exited
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while shut_down(&daemon) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!shut_down(&daemon));
    }
}

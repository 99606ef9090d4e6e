//! Discovery and state of one network interface.

use crate::collector::NetworkInterfaceDependencies;
use crate::collector::procfs::parse_net_dev;
use crate::error::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Names of every interface that has ever been seen up or running.
///
/// Interfaces not in the registry are never reported. Clones share the
/// same set; [`RunningInterfaces::global`] is the one used by default.
#[derive(Debug, Clone, Default)]
pub struct RunningInterfaces {
    names: Arc<Mutex<HashSet<String>>>,
}

impl RunningInterfaces {
    /// An empty registry, independent of the global one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<RunningInterfaces> = OnceLock::new();
        GLOBAL.get_or_init(RunningInterfaces::new).clone()
    }

    /// Records `name`; returns true if it was not known yet.
    pub fn mark(&self, name: &str) -> bool {
        let mut names = self.names.lock();
        if names.contains(name) {
            return false;
        }
        names.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }
}

/// Counters and attributes of one interface. `None` marks a value the
/// platform could not provide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkInterfaceInfo {
    pub name: String,
    pub bytes_received: Option<u64>,
    pub packets_received: Option<u64>,
    pub errors_receiving: Option<u64>,
    pub bytes_sent: Option<u64>,
    pub packets_sent: Option<u64>,
    pub errors_sending: Option<u64>,
    pub collisions: Option<u64>,
    pub ip_address: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
    pub broadcast_address: Option<Ipv4Addr>,
    pub up: Option<bool>,
    pub running: Option<bool>,
}

impl NetworkInterfaceInfo {
    /// Lists interfaces from `/proc/net/dev`, fills in address and flag
    /// attributes, and keeps only those present in `running` after this
    /// pass has recorded every interface currently up or running.
    pub fn find_all(
        deps: &dyn NetworkInterfaceDependencies,
        running: &RunningInterfaces,
    ) -> Result<Vec<NetworkInterfaceInfo>> {
        let devices = parse_net_dev(&deps.net_dev()?);

        let mut found = Vec::with_capacity(devices.len());
        for dev in devices {
            let attrs = deps.interface_attributes(&dev.interface);
            let info = NetworkInterfaceInfo {
                name: dev.interface,
                bytes_received: Some(dev.rx_bytes),
                packets_received: Some(dev.rx_packets),
                errors_receiving: Some(dev.rx_errs),
                bytes_sent: Some(dev.tx_bytes),
                packets_sent: Some(dev.tx_packets),
                errors_sending: Some(dev.tx_errs),
                collisions: Some(dev.collisions),
                ip_address: attrs.ip_address,
                netmask: attrs.netmask,
                broadcast_address: attrs.broadcast,
                up: attrs.up,
                running: attrs.running,
            };

            if info.is_up_or_running() && running.mark(&info.name) {
                debug!(interface = %info.name, "interface seen running");
            }
            if running.contains(&info.name) {
                found.push(info);
            } else {
                trace!(interface = %info.name, "skipping interface never seen running");
            }
        }
        Ok(found)
    }

    fn is_up_or_running(&self) -> bool {
        self.up == Some(true) || self.running == Some(true)
    }

    /// Both flags were readable.
    pub fn is_state_known(&self) -> bool {
        self.up.is_some() && self.running.is_some()
    }

    pub fn is_loopback_address(&self) -> bool {
        self.ip_address.is_some_and(|ip| {
            let [a, b, c, _] = ip.octets();
            (a, b, c) == (127, 0, 0)
        })
    }
}

/// One tracked interface.
#[derive(Clone)]
pub struct NetworkInterfaceInstance {
    info: NetworkInterfaceInfo,
    deps: Arc<dyn NetworkInterfaceDependencies>,
    running: RunningInterfaces,
}

impl fmt::Debug for NetworkInterfaceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkInterfaceInstance")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl NetworkInterfaceInstance {
    pub fn new(
        info: NetworkInterfaceInfo,
        deps: Arc<dyn NetworkInterfaceDependencies>,
        running: RunningInterfaces,
    ) -> Self {
        Self {
            info,
            deps,
            running,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &NetworkInterfaceInfo {
        &self.info
    }

    /// Re-discovers interfaces and takes the values of the one with this
    /// name. An interface that is no longer listed keeps its last values.
    pub fn update(&mut self) -> Result<()> {
        let latest = NetworkInterfaceInfo::find_all(self.deps.as_ref(), &self.running)?;
        match latest.into_iter().find(|i| i.name == self.info.name) {
            Some(info) => self.info = info,
            None => debug!(interface = %self.info.name, "interface no longer listed"),
        }
        Ok(())
    }

    pub(crate) fn update_from(&mut self, info: NetworkInterfaceInfo) {
        self.info = info;
    }

    pub fn ip_address(&self) -> Option<Ipv4Addr> {
        self.info.ip_address
    }

    pub fn netmask(&self) -> Option<Ipv4Addr> {
        self.info.netmask
    }

    pub fn broadcast_address(&self) -> Option<Ipv4Addr> {
        self.info.broadcast_address
    }

    pub fn bytes_received(&self) -> Option<u64> {
        self.info.bytes_received
    }

    pub fn bytes_sent(&self) -> Option<u64> {
        self.info.bytes_sent
    }

    pub fn packets_received(&self) -> Option<u64> {
        self.info.packets_received
    }

    pub fn packets_sent(&self) -> Option<u64> {
        self.info.packets_sent
    }

    pub fn errors_receiving(&self) -> Option<u64> {
        self.info.errors_receiving
    }

    pub fn errors_sending(&self) -> Option<u64> {
        self.info.errors_sending
    }

    pub fn collisions(&self) -> Option<u64> {
        self.info.collisions
    }

    pub fn up(&self) -> Option<bool> {
        self.info.up
    }

    pub fn running(&self) -> Option<bool> {
        self.info.running
    }
}

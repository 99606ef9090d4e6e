//! The set of tracked network interfaces, keyed by name.

use super::instance::{NetworkInterfaceInfo, NetworkInterfaceInstance, RunningInterfaces};
use crate::collector::NetworkInterfaceDependencies;
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

pub struct NetworkInterfaceEnumeration {
    deps: Arc<dyn NetworkInterfaceDependencies>,
    running: RunningInterfaces,
    instances: Vec<NetworkInterfaceInstance>,
}

impl NetworkInterfaceEnumeration {
    /// Enumeration backed by the process-wide running-interface registry.
    pub fn new(deps: Arc<dyn NetworkInterfaceDependencies>) -> Self {
        Self::with_registry(deps, RunningInterfaces::global())
    }

    pub fn with_registry(deps: Arc<dyn NetworkInterfaceDependencies>, running: RunningInterfaces) -> Self {
        Self {
            deps,
            running,
            instances: Vec::new(),
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.update_enumeration()?;
        info!(interfaces = self.size(), "network interface enumeration started");
        Ok(())
    }

    /// With `update_instances`, refreshes the tracked interfaces only;
    /// otherwise reconciles the set with the system.
    pub fn update(&mut self, update_instances: bool) -> Result<()> {
        if update_instances {
            self.update_instances()
        } else {
            self.update_enumeration()
        }
    }

    fn update_instances(&mut self) -> Result<()> {
        let latest = self.discover()?;
        for instance in &mut self.instances {
            if let Some(info) = latest.get(instance.name()) {
                instance.update_from(info.clone());
            }
        }
        trace!(interfaces = self.instances.len(), "network interfaces refreshed");
        Ok(())
    }

    /// Updates survivors in place, drops vanished interfaces and adds new
    /// ones whose flags are known and whose address is not loopback.
    pub fn update_enumeration(&mut self) -> Result<()> {
        let mut latest = self.discover()?;

        self.instances.retain_mut(|instance| match latest.remove(instance.name()) {
            Some(info) => {
                instance.update_from(info);
                true
            }
            None => {
                debug!(interface = instance.name(), "interface removed");
                false
            }
        });

        for (name, info) in latest {
            if info.is_state_known() && !info.is_loopback_address() {
                debug!(interface = %name, "interface added");
                self.instances.push(NetworkInterfaceInstance::new(
                    info,
                    self.deps.clone(),
                    self.running.clone(),
                ));
            } else {
                trace!(interface = %name, "not tracking interface");
            }
        }
        Ok(())
    }

    fn discover(&self) -> Result<BTreeMap<String, NetworkInterfaceInfo>> {
        let found = NetworkInterfaceInfo::find_all(self.deps.as_ref(), &self.running)?;
        Ok(found.into_iter().map(|i| (i.name.clone(), i)).collect())
    }

    pub fn size(&self) -> usize {
        self.instances.len()
    }

    pub fn instances(&self) -> &[NetworkInterfaceInstance] {
        &self.instances
    }

    pub fn find(&self, name: &str) -> Option<&NetworkInterfaceInstance> {
        self.instances.iter().find(|i| i.name() == name)
    }
}

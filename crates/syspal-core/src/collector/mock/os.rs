//! Mock `sysconf` and interface `ioctl` sources.

use crate::collector::traits::{InterfaceAttributes, InterfaceControl, Sysconf, SysconfKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// `sysconf` values held in memory. Clones share state.
#[derive(Debug, Clone)]
pub struct MockSysconf {
    values: Arc<RwLock<HashMap<SysconfKey, i64>>>,
}

impl MockSysconf {
    /// Four online CPUs, `USER_HZ` of 100 and 4 KiB pages.
    pub fn new() -> Self {
        let values = HashMap::from([
            (SysconfKey::ProcessorsOnline, 4),
            (SysconfKey::ClockTicks, 100),
            (SysconfKey::PageSize, 4096),
        ]);
        Self {
            values: Arc::new(RwLock::new(values)),
        }
    }

    pub fn set(&self, key: SysconfKey, value: i64) {
        self.values.write().insert(key, value);
    }

    pub fn unset(&self, key: SysconfKey) {
        self.values.write().remove(&key);
    }
}

impl Default for MockSysconf {
    fn default() -> Self {
        Self::new()
    }
}

impl Sysconf for MockSysconf {
    fn get(&self, key: SysconfKey) -> Option<i64> {
        self.values.read().get(&key).copied()
    }
}

/// Interface attributes keyed by name. Unknown names report nothing.
#[derive(Debug, Clone, Default)]
pub struct MockInterfaceControl {
    interfaces: Arc<RwLock<HashMap<String, InterfaceAttributes>>>,
}

impl MockInterfaceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, attrs: InterfaceAttributes) {
        self.interfaces.write().insert(name.to_string(), attrs);
    }
}

impl InterfaceControl for MockInterfaceControl {
    fn query(&self, name: &str) -> InterfaceAttributes {
        self.interfaces
            .read()
            .get(name)
            .copied()
            .unwrap_or_default()
    }
}

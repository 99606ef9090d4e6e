//! Network interfaces.
//!
//! Interfaces are discovered from `/proc/net/dev` and enriched with address
//! and flag `ioctl`s. Only interfaces that have been up or running at least
//! once (see [`RunningInterfaces`]) are ever reported.

mod enumeration;
mod instance;

pub use enumeration::NetworkInterfaceEnumeration;
pub use instance::{NetworkInterfaceInfo, NetworkInterfaceInstance, RunningInterfaces};

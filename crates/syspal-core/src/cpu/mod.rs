//! CPU tick sampling.
//!
//! [`CpuEnumeration`] keeps one [`CpuInstance`] per online logical
//! processor plus an aggregate, and a background thread pushes cumulative
//! tick counters into their histories. Percentages are derived by the
//! consumer from [`CpuTicks`] deltas.

mod enumeration;
mod instance;

pub use enumeration::CpuEnumeration;
pub use instance::{CpuInstance, CpuMetric, CpuTicks};

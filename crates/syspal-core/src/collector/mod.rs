//! OS access layer for the platform abstraction.
//!
//! Every metric family reads the operating system through a dependency shim,
//! which makes the sampling logic testable against fixtures.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        LinuxDeps                            │
//! │  CpuDependencies        MemoryDependencies                  │
//! │  ProcessDependencies    NetworkInterfaceDependencies        │
//! │        │                     │                  │           │
//! │  ┌─────▼──────┐       ┌──────▼─────┐    ┌───────▼────────┐  │
//! │  │ FileSystem │       │  Sysconf   │    │InterfaceControl│  │
//! │  └─────┬──────┘       └──────┬─────┘    └───────┬────────┘  │
//! └────────┼─────────────────────┼──────────────────┼───────────┘
//!          │                     │                  │
//!   ┌──────▼──────┐       ┌──────▼──────┐   ┌───────▼───────────────┐
//!   │ RealFs      │       │ LibcSysconf │   │ SocketInterfaceControl│
//!   │ MockFs      │       │ MockSysconf │   │ MockInterfaceControl  │
//!   └─────────────┘       └─────────────┘   └───────────────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production (Linux)
//!
//! ```ignore
//! use std::sync::Arc;
//! use syspal_core::collector::{LinuxDeps, RealFs};
//!
//! let deps = Arc::new(LinuxDeps::new(RealFs::new(), "/proc"));
//! ```
//!
//! ## Testing (with MockFs)
//!
//! ```
//! use syspal_core::collector::{CpuDependencies, LinuxDeps, MockFs, MockSysconf};
//!
//! let deps = LinuxDeps::new(MockFs::typical_system(), "/proc").with_sysconf(MockSysconf::new());
//! assert_eq!(deps.processors_online().unwrap(), 4);
//! ```

mod deps;
pub mod mock;
pub mod procfs;
pub mod traits;

pub use deps::{
    CpuDependencies, LinuxDeps, MemoryDependencies, NetworkInterfaceDependencies,
    ProcessDependencies,
};
pub use mock::{MockFs, MockInterfaceControl, MockSysconf};
pub use traits::{
    FileSystem, InterfaceAttributes, InterfaceControl, LibcSysconf, RealFs,
    SocketInterfaceControl, Sysconf, SysconfKey,
};

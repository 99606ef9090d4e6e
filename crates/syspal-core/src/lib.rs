//! syspal-core: platform abstraction layer for system metrics.
//!
//! Provides:
//! - `collector`: OS access shims (`/proc`, `sysconf`, interface `ioctl`s) and mocks
//! - `sampler`: sample ring buffers and the background sampling thread
//! - `cpu`: per-CPU and aggregate tick counters
//! - `memory`: physical memory, swap and paging rates
//! - `process`: per-process state, times, memory and I/O rates
//! - `network`: network interface counters and attributes
//! - `config`: sampling intervals and history sizes
//! - `error`: the error type every fallible call returns

pub mod collector;
pub mod config;
pub mod cpu;
pub mod error;
pub mod memory;
pub mod network;
pub mod process;
pub mod sampler;

pub use error::{PalError, Result};

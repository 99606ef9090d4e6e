//! Per-process metrics.
//!
//! [`ProcessEnumeration`] tracks every pid under the proc root and owns one
//! [`ProcessInstance`] per process. A process that disappears while being
//! read is dropped from the set; it is never reported as an error.

mod enumeration;
mod instance;
mod state;

pub use enumeration::ProcessEnumeration;
pub use instance::{MAX_ARGUMENT_BYTES, MAX_ARGUMENTS, ProcessInstance, TimedValues};
pub use state::ExecutionState;

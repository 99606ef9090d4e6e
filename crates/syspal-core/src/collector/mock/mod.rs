//! Mock OS sources and fixtures for tests and non-Linux development.

mod filesystem;
mod os;
mod scenarios;

pub use filesystem::MockFs;
pub use os::{MockInterfaceControl, MockSysconf};
pub use scenarios::{io_content, stat_line, typical_interfaces};

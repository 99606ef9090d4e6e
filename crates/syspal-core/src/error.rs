//! Error type shared by every PAL component.
//!
//! A process disappearing between discovery and read is not an error:
//! those paths return `Ok(false)` or `None`. Everything here is something a
//! caller has to log, skip, or surface.

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PalError>;

#[derive(Debug, thiserror::Error)]
pub enum PalError {
    /// Malformed OS content or an unexpected internal state.
    #[error("internal error in {call}: {detail}")]
    InternalError { call: String, detail: String },

    /// A system call returned a non-zero code.
    #[error("{call} failed with errno {errno}")]
    Errno { call: String, errno: i32 },

    /// A file under the proc tree could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A size or count cap was exceeded.
    #[error("resource exhausted: {what} exceeds {limit}")]
    ResourceExhausted { what: String, limit: usize },

    /// The caller lacks the privilege the metric needs.
    #[error("access violation: {0}")]
    AccessViolation(String),

    /// The facility does not exist on this target.
    #[error("not supported on this platform: {0}")]
    Unsupported(&'static str),
}

impl PalError {
    pub(crate) fn internal(call: impl Into<String>, detail: impl Into<String>) -> Self {
        PalError::InternalError {
            call: call.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        PalError::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an `Errno` from the calling thread's last OS error.
    pub(crate) fn last_errno(call: impl Into<String>) -> Self {
        PalError::Errno {
            call: call.into(),
            errno: io::Error::last_os_error().raw_os_error().unwrap_or(0),
        }
    }

    /// True for the privilege failure that getters surface lazily.
    pub fn is_access_violation(&self) -> bool {
        matches!(self, PalError::AccessViolation(_))
    }
}

/// Whether an I/O error means the process (or file) vanished underneath us.
///
/// A process being torn down can also make opens fail with `EBADF` or
/// `EINVAL`.
pub(crate) fn is_gone(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
        || matches!(
            err.raw_os_error(),
            Some(libc::ESRCH) | Some(libc::EBADF) | Some(libc::EINVAL)
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_call_and_detail() {
        let err = PalError::internal("parse_proc_stat", "missing ')'");
        assert_eq!(err.to_string(), "internal error in parse_proc_stat: missing ')'");
    }

    #[test]
    fn test_is_gone() {
        assert!(is_gone(&io::Error::new(io::ErrorKind::NotFound, "x")));
        assert!(is_gone(&io::Error::from_raw_os_error(libc::ESRCH)));
        assert!(is_gone(&io::Error::from_raw_os_error(libc::EINVAL)));
        assert!(!is_gone(&io::Error::new(io::ErrorKind::PermissionDenied, "x")));
    }

    #[test]
    fn test_access_violation_flag() {
        assert!(PalError::AccessViolation("io".into()).is_access_violation());
        assert!(!PalError::Unsupported("kstat").is_access_violation());
    }
}

//! Execution state of a process, in the platform-neutral model.
//!
//! Each platform reports its own native state codes. The mapping functions
//! below translate them; only a platform-dependent subset of the variants is
//! ever produced.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExecutionState {
    Unknown = 0,
    Other = 1,
    Ready = 2,
    Running = 3,
    Blocked = 4,
    SuspendedBlocked = 5,
    SuspendedReady = 6,
    Terminated = 7,
    Stopped = 8,
    Growing = 9,
    Relinquished = 10,
    Hung = 11,
}

impl ExecutionState {
    /// Numeric code of the state.
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionState::Unknown => "Unknown",
            ExecutionState::Other => "Other",
            ExecutionState::Ready => "Ready",
            ExecutionState::Running => "Running",
            ExecutionState::Blocked => "Blocked",
            ExecutionState::SuspendedBlocked => "Suspended_Blocked",
            ExecutionState::SuspendedReady => "Suspended_Ready",
            ExecutionState::Terminated => "Terminated",
            ExecutionState::Stopped => "Stopped",
            ExecutionState::Growing => "Growing",
            ExecutionState::Relinquished => "Relinquished",
            ExecutionState::Hung => "Hung",
        }
    }

    /// Linux `/proc/<pid>/stat` state letter.
    pub fn from_linux(state: char) -> Self {
        match state {
            'R' => ExecutionState::Running,
            'S' => ExecutionState::SuspendedReady,
            'D' => ExecutionState::SuspendedBlocked,
            'Z' | 'X' => ExecutionState::Terminated,
            'T' => ExecutionState::Stopped,
            'W' => ExecutionState::Growing,
            _ => ExecutionState::Unknown,
        }
    }

    /// Solaris `pr_sname` of the representative LWP.
    pub fn from_solaris(sname: char) -> Self {
        match sname {
            'O' => ExecutionState::Running,
            'S' => ExecutionState::SuspendedReady,
            'R' => ExecutionState::Ready,
            'Z' => ExecutionState::Terminated,
            'T' => ExecutionState::Stopped,
            _ => ExecutionState::Unknown,
        }
    }

    /// HP-UX `pst_stat` value (`PS_SLEEP` = 1 through `PS_OTHER` = 6).
    pub fn from_hpux(pst_stat: i64) -> Self {
        match pst_stat {
            1 => ExecutionState::SuspendedReady,
            2 => ExecutionState::Running,
            3 => ExecutionState::Stopped,
            4 => ExecutionState::Terminated,
            5 => ExecutionState::Ready,
            6 => ExecutionState::Other,
            _ => ExecutionState::Unknown,
        }
    }

    /// AIX `pr_sname`. Unrecognized codes of a zombie still map to
    /// `Terminated`.
    pub fn from_aix(sname: char, is_zombie: bool) -> Self {
        match sname {
            'O' => ExecutionState::Other,
            'A' => ExecutionState::Ready,
            'R' => ExecutionState::Running,
            'S' | 'I' => ExecutionState::SuspendedReady,
            'W' => ExecutionState::SuspendedBlocked,
            'Z' => ExecutionState::Terminated,
            'T' => ExecutionState::Stopped,
            _ if is_zombie => ExecutionState::Terminated,
            _ => ExecutionState::Unknown,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

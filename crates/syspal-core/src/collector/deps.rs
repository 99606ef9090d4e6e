//! Dependency shims, one per metric family.
//!
//! Every instance and enumeration of a family holds the same
//! `Arc<dyn ...Dependencies>`. [`LinuxDeps`] implements all four on top of
//! a [`FileSystem`], a [`Sysconf`] and an [`InterfaceControl`].

use crate::collector::traits::{
    FileSystem, InterfaceAttributes, InterfaceControl, LibcSysconf, SocketInterfaceControl,
    Sysconf, SysconfKey,
};
use crate::error::{PalError, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Clock ticks per second assumed when `_SC_CLK_TCK` is unavailable.
const DEFAULT_CLK_TCK: u64 = 100;
/// Page size assumed when `_SC_PAGESIZE` is unavailable.
const DEFAULT_PAGE_SIZE: u64 = 4096;

/// OS access needed by the CPU family.
pub trait CpuDependencies: Send + Sync {
    /// Content of `/proc/stat`.
    fn proc_stat(&self) -> Result<String>;
    /// Content of `/proc/cpuinfo`.
    fn cpuinfo(&self) -> Result<String>;
    /// Number of online logical processors.
    fn processors_online(&self) -> Result<usize>;
}

/// OS access needed by the memory instance.
pub trait MemoryDependencies: Send + Sync {
    /// Content of `/proc/meminfo`.
    fn meminfo(&self) -> Result<String>;
    /// Content of `/proc/vmstat`.
    fn vmstat(&self) -> Result<String>;
}

/// OS access needed by the process family.
///
/// Per-process reads return `io::Result` so callers can tell a vanished
/// process from a denied read.
pub trait ProcessDependencies: Send + Sync {
    /// Pids currently listed under the proc root.
    fn list_pids(&self) -> Result<Vec<u32>>;
    /// Reads `/proc/<pid>/<name>` as text.
    fn read_process_file(&self, pid: u32, name: &str) -> io::Result<String>;
    /// Reads `/proc/<pid>/<name>` as bytes.
    fn read_process_bytes(&self, pid: u32, name: &str) -> io::Result<Vec<u8>>;
    /// Owner `(uid, gid)` of the process.
    fn process_owner(&self, pid: u32) -> io::Result<(u32, u32)>;
    /// Target of `/proc/<pid>/exe`.
    fn process_executable(&self, pid: u32) -> io::Result<PathBuf>;
    /// System boot time in seconds since the epoch.
    fn boot_time(&self) -> Result<u64>;
    /// Clock ticks per second.
    fn clock_ticks(&self) -> u64;
    /// Page size in bytes.
    fn page_size(&self) -> u64;
    /// Sends `signal`; `Ok(false)` when the process no longer exists.
    fn send_signal(&self, pid: u32, signal: i32) -> Result<bool>;
}

/// OS access needed by the network interface family.
pub trait NetworkInterfaceDependencies: Send + Sync {
    /// Content of `/proc/net/dev`.
    fn net_dev(&self) -> Result<String>;
    /// Address and flag attributes of one interface.
    fn interface_attributes(&self, name: &str) -> InterfaceAttributes;
}

/// Linux implementation of every dependency shim.
pub struct LinuxDeps<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    sysconf: Arc<dyn Sysconf>,
    interfaces: Arc<dyn InterfaceControl>,
}

impl<F: FileSystem> LinuxDeps<F> {
    /// Creates a shim reading from `proc_path` with libc `sysconf` and
    /// socket `ioctl`s.
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            sysconf: Arc::new(LibcSysconf),
            interfaces: Arc::new(SocketInterfaceControl),
        }
    }

    pub fn with_sysconf(mut self, sysconf: impl Sysconf + 'static) -> Self {
        self.sysconf = Arc::new(sysconf);
        self
    }

    pub fn with_interface_control(mut self, interfaces: impl InterfaceControl + 'static) -> Self {
        self.interfaces = Arc::new(interfaces);
        self
    }

    fn read(&self, relative: &str) -> Result<String> {
        let path = self.proc_path.join(relative);
        self.fs
            .read_to_string(&path)
            .map_err(|e| PalError::io(path.display().to_string(), e))
    }

    fn process_path(&self, pid: u32, name: &str) -> PathBuf {
        self.proc_path.join(pid.to_string()).join(name)
    }

    fn sysconf_u64(&self, key: SysconfKey, fallback: u64) -> u64 {
        match self.sysconf.get(key) {
            Some(v) if v > 0 => v as u64,
            _ => {
                warn!(?key, fallback, "sysconf value unavailable, using fallback");
                fallback
            }
        }
    }
}

impl<F: FileSystem> CpuDependencies for LinuxDeps<F> {
    fn proc_stat(&self) -> Result<String> {
        self.read("stat")
    }

    fn cpuinfo(&self) -> Result<String> {
        self.read("cpuinfo")
    }

    fn processors_online(&self) -> Result<usize> {
        match self.sysconf.get(SysconfKey::ProcessorsOnline) {
            Some(n) if n >= 0 => Ok(n as usize),
            _ => Err(PalError::last_errno("sysconf(_SC_NPROCESSORS_ONLN)")),
        }
    }
}

impl<F: FileSystem> MemoryDependencies for LinuxDeps<F> {
    fn meminfo(&self) -> Result<String> {
        self.read("meminfo")
    }

    fn vmstat(&self) -> Result<String> {
        self.read("vmstat")
    }
}

impl<F: FileSystem> ProcessDependencies for LinuxDeps<F> {
    fn list_pids(&self) -> Result<Vec<u32>> {
        let entries = self
            .fs
            .read_dir(&self.proc_path)
            .map_err(|e| PalError::io(self.proc_path.display().to_string(), e))?;

        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|p| p.file_name())
            .filter_map(|name| name.to_str())
            .filter_map(|name| name.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn read_process_file(&self, pid: u32, name: &str) -> io::Result<String> {
        self.fs.read_to_string(&self.process_path(pid, name))
    }

    fn read_process_bytes(&self, pid: u32, name: &str) -> io::Result<Vec<u8>> {
        self.fs.read_bytes(&self.process_path(pid, name))
    }

    fn process_owner(&self, pid: u32) -> io::Result<(u32, u32)> {
        self.fs.owner(&self.process_path(pid, "stat"))
    }

    fn process_executable(&self, pid: u32) -> io::Result<PathBuf> {
        self.fs.read_link(&self.process_path(pid, "exe"))
    }

    fn boot_time(&self) -> Result<u64> {
        let content = self.read("stat")?;
        crate::collector::procfs::parse_btime(&content)
            .ok_or_else(|| PalError::internal("boot_time", "btime missing in /proc/stat"))
    }

    fn clock_ticks(&self) -> u64 {
        self.sysconf_u64(SysconfKey::ClockTicks, DEFAULT_CLK_TCK)
    }

    fn page_size(&self) -> u64 {
        self.sysconf_u64(SysconfKey::PageSize, DEFAULT_PAGE_SIZE)
    }

    fn send_signal(&self, pid: u32, signal: i32) -> Result<bool> {
        send_signal(pid, signal)
    }
}

impl<F: FileSystem> NetworkInterfaceDependencies for LinuxDeps<F> {
    fn net_dev(&self) -> Result<String> {
        self.read("net/dev")
    }

    fn interface_attributes(&self, name: &str) -> InterfaceAttributes {
        self.interfaces.query(name)
    }
}

fn send_signal(pid: u32, signal: i32) -> Result<bool> {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return Ok(false);
    };
    // SAFETY: kill(2) takes plain integers and has no memory effects.
    if unsafe { libc::kill(pid, signal) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => Ok(false),
        Some(libc::EPERM) => Err(PalError::AccessViolation(format!(
            "not permitted to signal pid {}",
            pid
        ))),
        errno => Err(PalError::Errno {
            call: "kill".to_string(),
            errno: errno.unwrap_or(0),
        }),
    }
}

//! One process, refreshed from `/proc/<pid>`.
//!
//! Raw values are committed by [`ProcessInstance::update_instance`] only when
//! every source was read; a process that disappears halfway leaves the
//! instance exactly as it was. Rates come from the deltas computed by
//! [`ProcessInstance::update_timed_values`] over the samples pushed by
//! [`ProcessInstance::update_data_sampler`].

use super::state::ExecutionState;
use crate::collector::ProcessDependencies;
use crate::collector::procfs::{
    ProcIo, ProcStat, ProcStatm, parse_proc_io, parse_proc_stat, parse_proc_statm,
};
use crate::error::{PalError, Result, is_gone};
use crate::sampler::SampleHistory;
use chrono::{DateTime, Utc};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Most arguments [`ProcessInstance::parameters`] returns before falling back
/// to the short form.
pub const MAX_ARGUMENTS: usize = 256;
/// Largest argument vector, in bytes, [`ProcessInstance::parameters`] accepts.
pub const MAX_ARGUMENT_BYTES: usize = 1024 * 1024;

/// Offset applied to the kernel priority so it matches what `ps` shows.
const PRIORITY_OFFSET: i32 = 60;
/// Offset applied to nice so the value is never negative.
const NICE_OFFSET: i32 = 20;

#[derive(Debug, Clone)]
struct Histories {
    real_ms: SampleHistory,
    user: SampleHistory,
    system: SampleHistory,
    major_faults: SampleHistory,
    // Only sampled while `io` is readable, so it has its own wall clock
    io_real_ms: SampleHistory,
    read_calls: SampleHistory,
    write_calls: SampleHistory,
}

impl Histories {
    fn new(capacity: usize) -> Self {
        Self {
            real_ms: SampleHistory::new(capacity),
            user: SampleHistory::new(capacity),
            system: SampleHistory::new(capacity),
            major_faults: SampleHistory::new(capacity),
            io_real_ms: SampleHistory::new(capacity),
            read_calls: SampleHistory::new(capacity),
            write_calls: SampleHistory::new(capacity),
        }
    }
}

/// Counter deltas over the whole retained history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimedValues {
    /// Wall clock, in milliseconds.
    pub real_ms: u64,
    /// User mode, in clock ticks.
    pub user_ticks: u64,
    /// Kernel mode, in clock ticks.
    pub system_ticks: u64,
    pub major_faults: u64,
    /// Wall clock covered by the I/O counters, in milliseconds.
    pub io_real_ms: u64,
    pub read_calls: u64,
    pub write_calls: u64,
}

/// Sampled state of one pid.
#[derive(Clone)]
pub struct ProcessInstance {
    pid: u32,
    deps: Arc<dyn ProcessDependencies>,
    clock_ticks: u64,
    page_size: u64,
    boot_time: u64,
    stat: ProcStat,
    statm: ProcStatm,
    io: Option<ProcIo>,
    owner: (u32, u32),
    access_violation: bool,
    time_of_death: Option<SystemTime>,
    histories: Histories,
    timed: TimedValues,
}

impl fmt::Debug for ProcessInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessInstance")
            .field("pid", &self.pid)
            .field("comm", &self.stat.comm)
            .field("state", &self.stat.state)
            .field("access_violation", &self.access_violation)
            .field("time_of_death", &self.time_of_death)
            .finish_non_exhaustive()
    }
}

impl ProcessInstance {
    /// Creates an empty instance; call [`ProcessInstance::update_instance`]
    /// with `initial = true` before reading anything.
    pub fn new(pid: u32, deps: Arc<dyn ProcessDependencies>, boot_time: u64, history: usize) -> Self {
        let clock_ticks = deps.clock_ticks().max(1);
        let page_size = deps.page_size();
        Self {
            pid,
            deps,
            clock_ticks,
            page_size,
            boot_time,
            stat: ProcStat {
                pid,
                ..Default::default()
            },
            statm: ProcStatm::default(),
            io: None,
            owner: (0, 0),
            access_violation: false,
            time_of_death: None,
            histories: Histories::new(history),
            timed: TimedValues::default(),
        }
    }

    /// Reads `stat`, `statm` and `io` for this pid.
    ///
    /// Returns `Ok(false)` when the process vanished; nothing is modified in
    /// that case. The owner is only read on the `initial` pass. A denied
    /// `io` read sets the access-violation flag until the next refresh that
    /// succeeds in reading it.
    pub fn update_instance(&mut self, initial: bool) -> Result<bool> {
        let Some(content) = self.read_live("stat")? else {
            return Ok(false);
        };
        let stat = parse_proc_stat(&content).map_err(|e| {
            PalError::internal("parse_proc_stat", format!("pid {}: {}", self.pid, e.message))
        })?;

        let owner = if initial {
            match self.deps.process_owner(self.pid) {
                Ok(owner) => owner,
                Err(e) if is_gone(&e) => return Ok(false),
                Err(e) => return Err(self.io_error("stat", e)),
            }
        } else {
            self.owner
        };

        // Zombies have released their address space
        let statm = if stat.state == 'Z' {
            self.statm
        } else {
            let Some(content) = self.read_live("statm")? else {
                return Ok(false);
            };
            parse_proc_statm(&content).map_err(|e| {
                PalError::internal("parse_proc_statm", format!("pid {}: {}", self.pid, e.message))
            })?
        };

        let (counters, access_violation) = match self.deps.read_process_file(self.pid, "io") {
            Ok(content) => (Some(parse_proc_io(&content)), false),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => (None, true),
            Err(e) if is_gone(&e) => {
                // Missing while stat is still there: no I/O accounting
                if self.read_live("stat")?.is_none() {
                    return Ok(false);
                }
                (None, false)
            }
            Err(e) => return Err(self.io_error("io", e)),
        };

        self.stat = stat;
        self.statm = statm;
        self.io = counters;
        self.owner = owner;
        self.access_violation = access_violation;
        trace!(pid = self.pid, state = %self.stat.state, "process refreshed");
        Ok(true)
    }

    /// Pushes one sample of every rate counter, stamped `now`.
    ///
    /// The first call that sees the process terminated records `now` as its
    /// time of death.
    pub fn update_data_sampler(&mut self, now: SystemTime) {
        let real_ms = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let h = &mut self.histories;
        h.real_ms.add_sample(real_ms);
        h.user.add_sample(self.stat.utime);
        h.system.add_sample(self.stat.stime);
        h.major_faults.add_sample(self.stat.majflt);
        if let Some(io) = &self.io {
            h.io_real_ms.add_sample(real_ms);
            h.read_calls.add_sample(io.syscr);
            h.write_calls.add_sample(io.syscw);
        }

        if self.time_of_death.is_none() && matches!(self.stat.state, 'Z' | 'X') {
            debug!(pid = self.pid, "process terminated");
            self.time_of_death = Some(now);
        }
    }

    /// Recomputes [`TimedValues`] over the full retained history.
    pub fn update_timed_values(&mut self) {
        let d = |h: &SampleHistory| h.delta(h.capacity());
        let h = &self.histories;
        self.timed = TimedValues {
            real_ms: d(&h.real_ms),
            user_ticks: d(&h.user),
            system_ticks: d(&h.system),
            major_faults: d(&h.major_faults),
            io_real_ms: d(&h.io_real_ms),
            read_calls: d(&h.read_calls),
            write_calls: d(&h.write_calls),
        };
    }

    /// Fails while the last refresh was denied privileged data.
    pub fn check_root_access(&self) -> Result<()> {
        if self.access_violation {
            return Err(PalError::AccessViolation(format!(
                "pid {}: /proc/{}/io is not readable",
                self.pid, self.pid
            )));
        }
        Ok(())
    }

    pub fn is_access_violation(&self) -> bool {
        self.access_violation
    }

    pub fn timed_values(&self) -> TimedValues {
        self.timed
    }

    /// Number of samples pushed since the instance was created, up to the
    /// history capacity.
    pub fn sample_count(&self) -> usize {
        self.histories.real_ms.len()
    }

    /// Start time in clock ticks after boot; identifies the process across
    /// pid reuse.
    pub fn start_ticks(&self) -> u64 {
        self.stat.starttime
    }

    /// Raw command name from `stat`.
    pub fn comm(&self) -> &str {
        &self.stat.comm
    }

    /// Sends `signal`; `Ok(false)` when the process is gone.
    pub fn send_signal(&self, signal: i32) -> Result<bool> {
        self.deps.send_signal(self.pid, signal)
    }

    fn read_live(&self, name: &str) -> Result<Option<String>> {
        match self.deps.read_process_file(self.pid, name) {
            // An empty file means the process exited while we opened it
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if is_gone(&e) => Ok(None),
            Err(e) => Err(self.io_error(name, e)),
        }
    }

    fn io_error(&self, name: &str, source: io::Error) -> PalError {
        PalError::io(format!("/proc/{}/{}", self.pid, name), source)
    }

    fn ticks_to_ms(&self, ticks: u64) -> u64 {
        ticks.saturating_mul(1000) / self.clock_ticks
    }

    fn percent_of_real(&self, ticks: u64) -> f64 {
        if self.timed.real_ms == 0 {
            return 0.0;
        }
        let busy_ms = ticks as f64 * 1000.0 / self.clock_ticks as f64;
        busy_ms * 100.0 / self.timed.real_ms as f64
    }

    fn per_second(items: u64, window_ms: u64) -> f64 {
        if window_ms == 0 {
            return 0.0;
        }
        items as f64 * 1000.0 / window_ms as f64
    }

    fn pages_to_bytes(&self, pages: u64) -> u64 {
        pages.saturating_mul(self.page_size)
    }

    // Identity and scheduling

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Command name; terminated processes read `[name] <defunct>`.
    pub fn name(&self) -> Option<String> {
        if self.stat.state == 'Z' {
            Some(format!("[{}] <defunct>", self.stat.comm))
        } else {
            Some(self.stat.comm.clone())
        }
    }

    pub fn priority(&self) -> Option<i32> {
        Some(self.stat.priority + PRIORITY_OFFSET)
    }

    pub fn execution_state(&self) -> Option<ExecutionState> {
        Some(ExecutionState::from_linux(self.stat.state))
    }

    /// Not reported on Linux.
    pub fn other_execution_description(&self) -> Option<String> {
        None
    }

    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        let since_boot_ms = self.stat.starttime.saturating_mul(1000) / self.clock_ticks;
        let ms = self.boot_time.saturating_mul(1000).saturating_add(since_boot_ms);
        DateTime::from_timestamp_millis(i64::try_from(ms).ok()?)
    }

    /// First time the process was seen terminated.
    pub fn termination_date(&self) -> Option<DateTime<Utc>> {
        self.time_of_death.map(DateTime::<Utc>::from)
    }

    pub fn parent_pid(&self) -> Option<u32> {
        Some(self.stat.ppid)
    }

    pub fn real_uid(&self) -> Option<u32> {
        Some(self.owner.0)
    }

    pub fn real_gid(&self) -> Option<u32> {
        Some(self.owner.1)
    }

    pub fn process_group(&self) -> Option<i32> {
        Some(self.stat.pgrp)
    }

    pub fn session_id(&self) -> Option<i32> {
        Some(self.stat.session)
    }

    pub fn nice(&self) -> Option<u32> {
        u32::try_from(self.stat.nice + NICE_OFFSET).ok()
    }

    /// Controlling terminal, `None` for daemons.
    pub fn controlling_tty(&self) -> Option<String> {
        tty_name(self.stat.tty_nr)
    }

    pub fn thread_count(&self) -> Option<i32> {
        Some(self.stat.num_threads)
    }

    /// Kernel symbol the process sleeps in, from `wchan`.
    pub fn waiting_for_event(&self) -> Option<String> {
        let content = self.deps.read_process_file(self.pid, "wchan").ok()?;
        let event = content.trim();
        if event.is_empty() || event == "0" {
            None
        } else {
            Some(event.to_string())
        }
    }

    /// Resolved executable path. Kernel threads have none.
    pub fn module_path(&self) -> Result<Option<PathBuf>> {
        self.check_root_access()?;
        match self.deps.process_executable(self.pid) {
            Ok(path) => Ok(Some(path)),
            Err(e) if is_gone(&e) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(
                PalError::AccessViolation(format!("pid {}: /proc/{}/exe", self.pid, self.pid)),
            ),
            Err(e) => Err(self.io_error("exe", e)),
        }
    }

    /// Argument vector from `cmdline`.
    ///
    /// Vectors over [`MAX_ARGUMENTS`] or [`MAX_ARGUMENT_BYTES`] are replaced
    /// by the short form `[comm]`.
    pub fn parameters(&self) -> Option<Vec<String>> {
        let bytes = match self.deps.read_process_bytes(self.pid, "cmdline") {
            Ok(bytes) => bytes,
            Err(e) => {
                trace!(pid = self.pid, error = %e, "cmdline not readable");
                return None;
            }
        };
        match split_arguments(&bytes, MAX_ARGUMENTS, MAX_ARGUMENT_BYTES) {
            Ok(args) => Some(args),
            Err(e) => {
                debug!(pid = self.pid, error = %e, "using short form of argument vector");
                Some(vec![format!("[{}]", self.stat.comm)])
            }
        }
    }

    // CPU time

    /// Time spent in kernel mode, in milliseconds.
    pub fn kernel_mode_time(&self) -> Option<u64> {
        Some(self.ticks_to_ms(self.stat.stime))
    }

    /// Time spent in user mode, in milliseconds.
    pub fn user_mode_time(&self) -> Option<u64> {
        Some(self.ticks_to_ms(self.stat.utime))
    }

    /// Share of wall clock spent on a CPU over the history window.
    pub fn cpu_time(&self) -> Option<f64> {
        Some(self.percent_of_real(self.timed.user_ticks + self.timed.system_ticks))
    }

    pub fn percent_user_time(&self) -> Option<f64> {
        Some(self.percent_of_real(self.timed.user_ticks))
    }

    pub fn percent_privileged_time(&self) -> Option<f64> {
        Some(self.percent_of_real(self.timed.system_ticks))
    }

    /// CPU time of waited-for children, in milliseconds.
    pub fn cpu_time_dead_children(&self) -> Option<u64> {
        let ticks = self.stat.cutime.max(0) + self.stat.cstime.max(0);
        Some(self.ticks_to_ms(ticks as u64))
    }

    /// Kernel time of waited-for children, in milliseconds.
    pub fn system_time_dead_children(&self) -> Option<u64> {
        Some(self.ticks_to_ms(self.stat.cstime.max(0) as u64))
    }

    // Memory

    /// Resident set size, in kB.
    pub fn used_memory(&self) -> Option<u64> {
        Some(self.pages_to_bytes(self.stat.rss.max(0) as u64) / 1024)
    }

    /// Resident set as a share of the virtual size.
    pub fn percent_used_memory(&self) -> Option<f64> {
        if self.stat.vsize == 0 {
            return Some(0.0);
        }
        let resident = self.pages_to_bytes(self.stat.rss.max(0) as u64);
        Some(resident as f64 * 100.0 / self.stat.vsize as f64)
    }

    pub fn pages_read_per_second(&self) -> Option<f64> {
        Some(Self::per_second(self.timed.major_faults, self.timed.real_ms))
    }

    /// Bytes of executable text.
    pub fn virtual_text(&self) -> Option<u64> {
        Some(self.pages_to_bytes(self.statm.text))
    }

    /// Bytes of data and stack.
    pub fn virtual_data(&self) -> Option<u64> {
        Some(self.pages_to_bytes(self.statm.data))
    }

    /// Bytes of file-backed resident pages.
    pub fn virtual_shared_memory(&self) -> Option<u64> {
        Some(self.pages_to_bytes(self.statm.shared))
    }

    /// Not reported on Linux.
    pub fn working_set_size(&self) -> Option<u64> {
        None
    }

    pub fn real_text(&self) -> Option<u64> {
        None
    }

    pub fn real_data(&self) -> Option<u64> {
        None
    }

    pub fn real_stack(&self) -> Option<u64> {
        None
    }

    pub fn virtual_stack(&self) -> Option<u64> {
        None
    }

    pub fn virtual_memory_mapped_file_size(&self) -> Option<u64> {
        None
    }

    // Block I/O, from the read/write syscall counters in `io`

    pub fn block_reads_per_second(&self) -> Result<Option<f64>> {
        self.check_root_access()?;
        Ok(self
            .io
            .map(|_| Self::per_second(self.timed.read_calls, self.timed.io_real_ms)))
    }

    pub fn block_writes_per_second(&self) -> Result<Option<f64>> {
        self.check_root_access()?;
        Ok(self
            .io
            .map(|_| Self::per_second(self.timed.write_calls, self.timed.io_real_ms)))
    }

    pub fn block_transfers_per_second(&self) -> Result<Option<f64>> {
        self.check_root_access()?;
        Ok(self
            .io
            .map(|_| {
                Self::per_second(
                    self.timed.read_calls + self.timed.write_calls,
                    self.timed.io_real_ms,
                )
            }))
    }
}

/// Splits a NUL-separated argument vector. Two consecutive NULs end it.
pub(crate) fn split_arguments(bytes: &[u8], max_args: usize, max_bytes: usize) -> Result<Vec<String>> {
    if bytes.len() > max_bytes {
        return Err(PalError::ResourceExhausted {
            what: "argument vector bytes".to_string(),
            limit: max_bytes,
        });
    }
    let mut args = Vec::new();
    if bytes.is_empty() {
        return Ok(args);
    }
    for (i, part) in bytes.split(|b| *b == 0).enumerate() {
        if part.is_empty() && i > 0 {
            break;
        }
        if args.len() == max_args {
            return Err(PalError::ResourceExhausted {
                what: "argument count".to_string(),
                limit: max_args,
            });
        }
        args.push(String::from_utf8_lossy(part).into_owned());
    }
    Ok(args)
}

/// Decodes the `tty_nr` device number of `stat`.
fn tty_name(tty_nr: i32) -> Option<String> {
    if tty_nr <= 0 {
        return None;
    }
    let nr = tty_nr as u32;
    let major = (nr >> 8) & 0xfff;
    let minor = (nr & 0xff) | ((nr >> 12) & 0xfff00);
    let name = match major {
        4 if minor < 64 => format!("tty{}", minor),
        4 => format!("ttyS{}", minor - 64),
        136..=143 => format!("pts/{}", (major - 136) * 256 + minor),
        _ => format!("{}:{}", major, minor),
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{io_content, stat_line};
    use crate::collector::{LinuxDeps, MockFs, MockSysconf};
    use std::time::Duration;

    const BOOT: u64 = 1700000000;

    fn deps(fs: &MockFs) -> Arc<dyn ProcessDependencies> {
        Arc::new(LinuxDeps::new(fs.clone(), "/proc").with_sysconf(MockSysconf::new()))
    }

    fn refreshed(fs: &MockFs, pid: u32) -> ProcessInstance {
        let mut process = ProcessInstance::new(pid, deps(fs), BOOT, 2);
        assert!(process.update_instance(true).unwrap());
        process
    }

    #[test]
    fn test_identity_getters() {
        let fs = MockFs::typical_system();
        let bash = refreshed(&fs, 1234);

        assert_eq!(bash.pid(), 1234);
        assert_eq!(bash.name().as_deref(), Some("bash"));
        assert_eq!(bash.parent_pid(), Some(1));
        assert_eq!(bash.real_uid(), Some(1000));
        assert_eq!(bash.real_gid(), Some(1000));
        assert_eq!(bash.process_group(), Some(1234));
        assert_eq!(bash.session_id(), Some(1234));
        assert_eq!(bash.priority(), Some(80));
        assert_eq!(bash.nice(), Some(20));
        assert_eq!(bash.execution_state(), Some(ExecutionState::SuspendedReady));
        assert_eq!(bash.controlling_tty().as_deref(), Some("pts/0"));
        assert_eq!(bash.waiting_for_event().as_deref(), Some("do_wait"));
        assert_eq!(
            bash.parameters(),
            Some(vec!["/bin/bash".to_string(), "--login".to_string()])
        );
        assert_eq!(
            bash.module_path().unwrap(),
            Some(PathBuf::from("/usr/bin/bash"))
        );
        assert_eq!(bash.termination_date(), None);
    }

    #[test]
    fn test_creation_date_from_boot_and_start_ticks() {
        let fs = MockFs::typical_system();
        let bash = refreshed(&fs, 1234);
        // 12345 ticks at 100 Hz after boot
        let expected = DateTime::from_timestamp_millis(1700000123450).unwrap();
        assert_eq!(bash.creation_date(), Some(expected));
    }

    #[test]
    fn test_time_and_memory_getters() {
        let fs = MockFs::typical_system();
        let bash = refreshed(&fs, 1234);

        assert_eq!(bash.user_mode_time(), Some(100));
        assert_eq!(bash.kernel_mode_time(), Some(50));
        assert_eq!(bash.cpu_time_dead_children(), Some(90));
        assert_eq!(bash.system_time_dead_children(), Some(20));

        // rss 300 pages of 4096 bytes
        assert_eq!(bash.used_memory(), Some(1200));
        let percent = bash.percent_used_memory().unwrap();
        assert!((percent - 1228800.0 * 100.0 / 12345678.0).abs() < 1e-9);
        assert_eq!(bash.virtual_text(), Some(200 * 4096));
        assert_eq!(bash.virtual_data(), Some(600 * 4096));
        assert_eq!(bash.virtual_shared_memory(), Some(400 * 4096));

        assert_eq!(bash.working_set_size(), None);
        assert_eq!(bash.virtual_stack(), None);
        assert_eq!(bash.other_execution_description(), None);
    }

    #[test]
    fn test_rates_over_history() {
        let fs = MockFs::typical_system();
        let mut bash = refreshed(&fs, 1234);
        let t0 = UNIX_EPOCH + Duration::from_secs(BOOT + 1000);
        bash.update_data_sampler(t0);

        fs.add_file("/proc/1234/stat", stat_line(1234, "bash", 'R', 60, 30, 12345));
        fs.add_file("/proc/1234/io", io_content(200, 70));
        assert!(bash.update_instance(false).unwrap());
        bash.update_data_sampler(t0 + Duration::from_secs(10));
        bash.update_timed_values();

        // 75 ticks at 100 Hz over 10 s
        assert_eq!(bash.cpu_time(), Some(7.5));
        assert_eq!(bash.percent_user_time(), Some(5.0));
        assert_eq!(bash.percent_privileged_time(), Some(2.5));
        assert_eq!(bash.pages_read_per_second(), Some(0.0));
        assert_eq!(bash.block_reads_per_second().unwrap(), Some(10.0));
        assert_eq!(bash.block_writes_per_second().unwrap(), Some(2.0));
        assert_eq!(bash.block_transfers_per_second().unwrap(), Some(12.0));
        assert_eq!(bash.execution_state(), Some(ExecutionState::Running));
    }

    #[test]
    fn test_block_rates_span_passes_with_denied_io() {
        let fs = MockFs::typical_system();
        let mut bash = refreshed(&fs, 1234);
        let t0 = UNIX_EPOCH + Duration::from_secs(BOOT + 1000);
        fs.add_file("/proc/1234/io", io_content(100, 40));
        assert!(bash.update_instance(false).unwrap());
        bash.update_data_sampler(t0);

        fs.deny("/proc/1234/io");
        assert!(bash.update_instance(false).unwrap());
        bash.update_data_sampler(t0 + Duration::from_secs(10));

        fs.allow("/proc/1234/io");
        fs.add_file("/proc/1234/io", io_content(300, 80));
        assert!(bash.update_instance(false).unwrap());
        bash.update_data_sampler(t0 + Duration::from_secs(20));
        bash.update_timed_values();

        // 200 reads between the two readable passes, 20 s apart
        assert_eq!(bash.timed_values().real_ms, 10_000);
        assert_eq!(bash.timed_values().io_real_ms, 20_000);
        assert_eq!(bash.block_reads_per_second().unwrap(), Some(10.0));
        assert_eq!(bash.block_writes_per_second().unwrap(), Some(2.0));
        assert_eq!(bash.block_transfers_per_second().unwrap(), Some(12.0));
    }

    #[test]
    fn test_rates_without_history_are_zero() {
        let fs = MockFs::typical_system();
        let mut bash = refreshed(&fs, 1234);
        bash.update_timed_values();
        assert_eq!(bash.cpu_time(), Some(0.0));
        assert_eq!(bash.block_reads_per_second().unwrap(), Some(0.0));
    }

    #[test]
    fn test_vanished_process_returns_false() {
        let fs = MockFs::typical_system();
        let mut bash = refreshed(&fs, 1234);
        fs.remove("/proc/1234");
        assert!(!bash.update_instance(false).unwrap());
        assert_eq!(bash.name().as_deref(), Some("bash"));
    }

    #[test]
    fn test_vanishing_mid_read_leaves_instance_untouched() {
        let fs = MockFs::typical_system();
        let mut bash = refreshed(&fs, 1234);

        fs.add_file("/proc/1234/stat", stat_line(1234, "bash", 'R', 99, 99, 12345));
        fs.remove("/proc/1234/statm");
        assert!(!bash.update_instance(false).unwrap());

        assert_eq!(bash.user_mode_time(), Some(100));
        assert_eq!(bash.execution_state(), Some(ExecutionState::SuspendedReady));
        assert_eq!(bash.virtual_text(), Some(200 * 4096));
    }

    /// Removes the process directory the moment `io` is opened.
    struct ExitsOnIoRead {
        fs: MockFs,
        inner: LinuxDeps<MockFs>,
    }

    impl ProcessDependencies for ExitsOnIoRead {
        fn list_pids(&self) -> Result<Vec<u32>> {
            self.inner.list_pids()
        }
        fn read_process_file(&self, pid: u32, name: &str) -> io::Result<String> {
            if name == "io" {
                self.fs.remove(format!("/proc/{}", pid));
            }
            self.inner.read_process_file(pid, name)
        }
        fn read_process_bytes(&self, pid: u32, name: &str) -> io::Result<Vec<u8>> {
            self.inner.read_process_bytes(pid, name)
        }
        fn process_owner(&self, pid: u32) -> io::Result<(u32, u32)> {
            self.inner.process_owner(pid)
        }
        fn process_executable(&self, pid: u32) -> io::Result<PathBuf> {
            self.inner.process_executable(pid)
        }
        fn boot_time(&self) -> Result<u64> {
            self.inner.boot_time()
        }
        fn clock_ticks(&self) -> u64 {
            self.inner.clock_ticks()
        }
        fn page_size(&self) -> u64 {
            self.inner.page_size()
        }
        fn send_signal(&self, pid: u32, signal: i32) -> Result<bool> {
            self.inner.send_signal(pid, signal)
        }
    }

    #[test]
    fn test_exit_before_io_read_returns_false() {
        let fs = MockFs::typical_system();
        let inner = LinuxDeps::new(fs.clone(), "/proc").with_sysconf(MockSysconf::new());
        let deps = Arc::new(ExitsOnIoRead {
            fs: fs.clone(),
            inner,
        });
        let mut bash = ProcessInstance::new(1234, deps, BOOT, 2);
        assert!(!bash.update_instance(true).unwrap());
        assert_eq!(bash.comm(), "");
    }

    #[test]
    fn test_io_missing_while_alive_is_kept() {
        let fs = MockFs::typical_system();
        let mut bash = refreshed(&fs, 1234);
        fs.remove("/proc/1234/io");
        assert!(bash.update_instance(false).unwrap());
        assert_eq!(bash.block_reads_per_second().unwrap(), None);
    }

    #[test]
    fn test_empty_stat_counts_as_gone() {
        let fs = MockFs::typical_system();
        fs.add_file("/proc/1234/stat", "");
        let mut bash = ProcessInstance::new(1234, deps(&fs), BOOT, 2);
        assert!(!bash.update_instance(true).unwrap());
    }

    #[test]
    fn test_malformed_stat_is_internal_error() {
        let fs = MockFs::typical_system();
        fs.add_file("/proc/1234/stat", "1234 (bash) S 1");
        let mut bash = ProcessInstance::new(1234, deps(&fs), BOOT, 2);
        assert!(matches!(
            bash.update_instance(true),
            Err(PalError::InternalError { .. })
        ));
    }

    #[test]
    fn test_zombie_name_and_time_of_death() {
        let fs = MockFs::typical_system();
        let mut worker = refreshed(&fs, 2000);

        assert_eq!(worker.name().as_deref(), Some("[worker] <defunct>"));
        assert_eq!(worker.execution_state(), Some(ExecutionState::Terminated));

        let first = UNIX_EPOCH + Duration::from_secs(BOOT + 500);
        worker.update_data_sampler(first);
        worker.update_data_sampler(first + Duration::from_secs(60));
        assert_eq!(worker.termination_date(), Some(DateTime::<Utc>::from(first)));

        // Zombies have no statm to read
        fs.remove("/proc/2000/statm");
        assert!(worker.update_instance(false).unwrap());
        assert_eq!(worker.termination_date(), Some(DateTime::<Utc>::from(first)));
    }

    #[test]
    fn test_denied_io_is_sticky_until_refresh() {
        let fs = MockFs::typical_system();
        fs.deny("/proc/1234/io");
        let mut bash = refreshed(&fs, 1234);

        assert!(bash.is_access_violation());
        for _ in 0..3 {
            assert!(matches!(
                bash.block_reads_per_second(),
                Err(PalError::AccessViolation(_))
            ));
            assert!(bash.module_path().unwrap_err().is_access_violation());
        }
        // Unprivileged getters are unaffected
        assert_eq!(bash.user_mode_time(), Some(100));

        fs.allow("/proc/1234/io");
        assert!(bash.update_instance(false).unwrap());
        assert!(bash.check_root_access().is_ok());
        assert!(bash.block_writes_per_second().unwrap().is_some());
    }

    #[test]
    fn test_missing_io_is_unsupported() {
        let fs = MockFs::typical_system();
        fs.remove("/proc/1234/io");
        let bash = refreshed(&fs, 1234);
        assert!(!bash.is_access_violation());
        assert_eq!(bash.block_reads_per_second().unwrap(), None);
    }

    #[test]
    fn test_kernel_thread_has_no_module_path() {
        let fs = MockFs::typical_system();
        fs.add_process(2, &stat_line(2, "kthreadd", 'S', 0, 0, 1), "0 0 0 0 0 0 0\n", "", "");
        let kthreadd = refreshed(&fs, 2);
        assert_eq!(kthreadd.module_path().unwrap(), None);
        assert_eq!(kthreadd.parameters(), Some(Vec::new()));
        assert_eq!(kthreadd.used_memory(), Some(1200));
        assert_eq!(kthreadd.virtual_text(), Some(0));
    }

    #[test]
    fn test_oversized_argument_vector_uses_short_form() {
        let fs = MockFs::typical_system();
        let cmdline: String = (0..300).map(|i| format!("arg{}\0", i)).collect();
        fs.add_file("/proc/1234/cmdline", cmdline);
        let bash = refreshed(&fs, 1234);
        assert_eq!(bash.parameters(), Some(vec!["[bash]".to_string()]));
    }

    #[test]
    fn test_split_arguments_limits() {
        assert_eq!(
            split_arguments(b"a\0b\0\0c\0", 10, 100).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(matches!(
            split_arguments(b"a\0b\0c\0", 2, 100),
            Err(PalError::ResourceExhausted { limit: 2, .. })
        ));
        assert!(matches!(
            split_arguments(&[b'x'; 64], 10, 32),
            Err(PalError::ResourceExhausted { limit: 32, .. })
        ));
        assert!(split_arguments(b"", 10, 100).unwrap().is_empty());
    }

    #[test]
    fn test_tty_names() {
        assert_eq!(tty_name(0), None);
        assert_eq!(tty_name(34816).as_deref(), Some("pts/0"));
        assert_eq!(tty_name((136 << 8) | 5).as_deref(), Some("pts/5"));
        assert_eq!(tty_name((4 << 8) | 1).as_deref(), Some("tty1"));
        assert_eq!(tty_name((4 << 8) | 65).as_deref(), Some("ttyS1"));
    }
}

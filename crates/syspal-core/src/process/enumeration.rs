//! All processes listed under the proc root, refreshed in the background.

use super::instance::ProcessInstance;
use crate::collector::ProcessDependencies;
use crate::config::SamplingConfig;
use crate::error::{PalError, Result};
use crate::sampler::SamplerThread;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default)]
struct ProcessSet {
    instances: BTreeMap<u32, ProcessInstance>,
    boot_time: u64,
    /// Whether the previous pass hit per-instance errors.
    failing: bool,
}

enum Outcome {
    Keep,
    Create,
    Remove,
}

struct ProcessShared {
    deps: Arc<dyn ProcessDependencies>,
    history: usize,
    set: Mutex<ProcessSet>,
}

impl ProcessShared {
    /// Adds new pids, refreshes known ones and drops the ones that are gone.
    fn refresh(&self, set: &mut ProcessSet) -> Result<()> {
        let pids = self.deps.list_pids()?;
        let listed: HashSet<u32> = pids.iter().copied().collect();
        set.instances.retain(|pid, _| listed.contains(pid));

        let loud = !set.failing;
        let mut errors = 0usize;
        for pid in pids {
            let outcome = match set.instances.get_mut(&pid) {
                None => Outcome::Create,
                Some(instance) => {
                    let started = instance.start_ticks();
                    match instance.update_instance(false) {
                        Ok(true) if instance.start_ticks() != started => {
                            debug!(pid, "pid reused, replacing instance");
                            Outcome::Create
                        }
                        Ok(true) => Outcome::Keep,
                        Ok(false) => Outcome::Remove,
                        Err(e) => {
                            errors += 1;
                            log_instance_error(loud, pid, &e);
                            Outcome::Keep
                        }
                    }
                }
            };

            match outcome {
                Outcome::Keep => {}
                Outcome::Remove => {
                    trace!(pid, "process gone");
                    set.instances.remove(&pid);
                }
                Outcome::Create => {
                    set.instances.remove(&pid);
                    let mut instance =
                        ProcessInstance::new(pid, self.deps.clone(), set.boot_time, self.history);
                    match instance.update_instance(true) {
                        Ok(true) => {
                            set.instances.insert(pid, instance);
                        }
                        Ok(false) => {}
                        Err(e) => {
                            errors += 1;
                            log_instance_error(loud, pid, &e);
                        }
                    }
                }
            }
        }

        if errors > 0 && loud {
            warn!(errors, "process enumeration pass had errors");
        } else if errors == 0 && set.failing {
            info!("process enumeration recovered");
        }
        set.failing = errors > 0;
        Ok(())
    }

    fn sample_data(&self) -> Result<()> {
        let now = SystemTime::now();
        let mut set = self.set.lock();
        self.refresh(&mut set)?;
        for instance in set.instances.values_mut() {
            instance.update_data_sampler(now);
        }
        trace!(processes = set.instances.len(), "process samples taken");
        Ok(())
    }
}

/// Logs at warn on the first failing pass and at debug while it keeps
/// failing.
fn log_instance_error(loud: bool, pid: u32, error: &PalError) {
    if loud {
        warn!(pid, %error, "failed to refresh process");
    } else {
        debug!(pid, %error, "failed to refresh process");
    }
}

/// Owns one [`ProcessInstance`] per listed pid.
pub struct ProcessEnumeration {
    shared: Arc<ProcessShared>,
    config: SamplingConfig,
    thread: Option<SamplerThread>,
}

impl ProcessEnumeration {
    pub fn new(deps: Arc<dyn ProcessDependencies>, config: SamplingConfig) -> Self {
        Self {
            shared: Arc::new(ProcessShared {
                deps,
                history: config.history,
                set: Mutex::new(ProcessSet::default()),
            }),
            config,
            thread: None,
        }
    }

    /// Reads the boot time, builds the instance set and starts sampling.
    pub fn init(&mut self) -> Result<()> {
        let boot_time = self.shared.deps.boot_time()?;
        self.shared.set.lock().boot_time = boot_time;
        self.update(true)?;

        let shared = self.shared.clone();
        let thread = SamplerThread::spawn("syspal-process", self.config.interval, move || {
            if let Err(e) = shared.sample_data() {
                warn!(error = %e, "process sampling pass failed");
            }
        })?;
        self.thread = Some(thread);
        info!(
            processes = self.size(),
            interval = ?self.config.interval,
            "process enumeration started"
        );
        Ok(())
    }

    /// Reconciles the instance set with the listed pids. With
    /// `update_instances`, also recomputes every instance's timed values.
    pub fn update(&self, update_instances: bool) -> Result<()> {
        let mut set = self.shared.set.lock();
        self.shared.refresh(&mut set)?;
        if update_instances {
            for instance in set.instances.values_mut() {
                instance.update_timed_values();
            }
        }
        Ok(())
    }

    /// One sampling pass: reconcile, then push a sample into every instance.
    pub fn sample_data(&self) -> Result<()> {
        self.shared.sample_data()
    }

    /// Stops the sampling thread.
    pub fn clean_up(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
        }
    }

    pub fn size(&self) -> usize {
        self.shared.set.lock().instances.len()
    }

    /// Snapshot of every instance, ordered by pid.
    pub fn instances(&self) -> Vec<ProcessInstance> {
        self.shared.set.lock().instances.values().cloned().collect()
    }

    pub fn find(&self, pid: u32) -> Option<ProcessInstance> {
        self.shared.set.lock().instances.get(&pid).cloned()
    }

    /// Instances whose command name is exactly `name`.
    pub fn find_by_name(&self, name: &str) -> Vec<ProcessInstance> {
        self.shared
            .set
            .lock()
            .instances
            .values()
            .filter(|p| p.comm() == name)
            .cloned()
            .collect()
    }

    /// Signals every process named `name`. Returns whether at least one was
    /// signalled.
    pub fn send_signal_by_name(&self, name: &str, signal: i32) -> Result<bool> {
        let mut delivered = false;
        for process in self.find_by_name(name) {
            delivered |= process.send_signal(signal)?;
        }
        Ok(delivered)
    }

    /// Number of pids currently listed, without building instances.
    pub fn number_of_processes(deps: &dyn ProcessDependencies) -> Result<usize> {
        Ok(deps.list_pids()?.len())
    }
}

impl Drop for ProcessEnumeration {
    fn drop(&mut self) {
        self.clean_up();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::stat_line;
    use crate::collector::{LinuxDeps, MockFs, MockSysconf};
    use std::time::{Duration, Instant};

    fn enumeration(fs: &MockFs, interval: Duration) -> ProcessEnumeration {
        let deps = LinuxDeps::new(fs.clone(), "/proc").with_sysconf(MockSysconf::new());
        ProcessEnumeration::new(Arc::new(deps), SamplingConfig::new(interval, 2))
    }

    #[test]
    fn test_update_discovers_processes() {
        let fs = MockFs::typical_system();
        let procs = enumeration(&fs, Duration::from_secs(60));
        procs.update(true).unwrap();

        assert_eq!(procs.size(), 3);
        assert_eq!(procs.find(1234).and_then(|p| p.name()).as_deref(), Some("bash"));
        assert_eq!(procs.find_by_name("systemd").len(), 1);
        assert!(procs.find_by_name("nginx").is_empty());
        let pids: Vec<u32> = procs.instances().iter().map(|p| p.pid()).collect();
        assert_eq!(pids, vec![1, 1234, 2000]);
    }

    #[test]
    fn test_vanished_and_new_pids() {
        let fs = MockFs::typical_system();
        let procs = enumeration(&fs, Duration::from_secs(60));
        procs.update(false).unwrap();

        fs.remove("/proc/2000");
        fs.add_process(
            3000,
            &stat_line(3000, "sleep", 'S', 1, 1, 50000),
            "100 50 20 10 0 30 0\n",
            "",
            "sleep\0100\0",
        );
        procs.update(false).unwrap();

        assert!(procs.find(2000).is_none());
        assert_eq!(procs.find(3000).and_then(|p| p.name()).as_deref(), Some("sleep"));
        assert_eq!(procs.size(), 3);
    }

    #[test]
    fn test_process_gone_during_refresh_is_removed() {
        let fs = MockFs::typical_system();
        let procs = enumeration(&fs, Duration::from_secs(60));
        procs.update(false).unwrap();

        // Still listed, but the stat file is already empty
        fs.add_file("/proc/1234/stat", "");
        procs.update(false).unwrap();
        assert!(procs.find(1234).is_none());
    }

    #[test]
    fn test_pid_reuse_replaces_instance() {
        let fs = MockFs::typical_system();
        let procs = enumeration(&fs, Duration::from_secs(60));
        procs.sample_data().unwrap();
        procs.sample_data().unwrap();
        assert_eq!(procs.find(1234).unwrap().sample_count(), 2);

        fs.add_file("/proc/1234/stat", stat_line(1234, "python", 'R', 0, 0, 99999));
        fs.set_owner("/proc/1234/stat", 0, 0);
        procs.update(false).unwrap();

        let reused = procs.find(1234).unwrap();
        assert_eq!(reused.comm(), "python");
        assert_eq!(reused.sample_count(), 0);
        assert_eq!(reused.real_uid(), Some(0));
    }

    #[test]
    fn test_sample_data_feeds_every_instance() {
        let fs = MockFs::typical_system();
        let procs = enumeration(&fs, Duration::from_secs(60));
        procs.sample_data().unwrap();

        assert!(procs.instances().iter().all(|p| p.sample_count() == 1));
        let zombie = procs.find(2000).unwrap();
        assert!(zombie.termination_date().is_some());
        assert!(procs.find(1).unwrap().termination_date().is_none());
    }

    #[test]
    fn test_errors_are_logged_and_skipped() {
        let fs = MockFs::typical_system();
        fs.add_file("/proc/1/stat", "1 (systemd) S");
        let procs = enumeration(&fs, Duration::from_secs(60));

        procs.update(false).unwrap();
        assert!(procs.find(1).is_none());
        assert_eq!(procs.size(), 2);
        assert!(procs.shared.set.lock().failing);

        procs.update(false).unwrap();
        assert!(procs.shared.set.lock().failing);

        fs.add_file("/proc/1/stat", stat_line(1, "systemd", 'S', 500, 300, 1));
        procs.update(false).unwrap();
        assert!(!procs.shared.set.lock().failing);
        assert_eq!(procs.size(), 3);
    }

    #[test]
    fn test_missing_proc_root_fails_pass() {
        let fs = MockFs::new();
        let procs = enumeration(&fs, Duration::from_secs(60));
        assert!(matches!(procs.update(false), Err(PalError::Io { .. })));
    }

    #[test]
    fn test_number_of_processes() {
        let deps = LinuxDeps::new(MockFs::typical_system(), "/proc");
        assert_eq!(ProcessEnumeration::number_of_processes(&deps).unwrap(), 3);
    }

    #[test]
    fn test_send_signal_by_unknown_name() {
        let fs = MockFs::typical_system();
        let procs = enumeration(&fs, Duration::from_secs(60));
        procs.update(false).unwrap();
        assert!(!procs.send_signal_by_name("nginx", 0).unwrap());
    }

    #[test]
    fn test_init_samples_in_background() {
        let fs = MockFs::typical_system();
        let mut procs = enumeration(&fs, Duration::from_millis(10));
        procs.init().unwrap();
        assert_eq!(procs.shared.set.lock().boot_time, 1700000000);

        let start = Instant::now();
        while procs.find(1234).map_or(0, |p| p.sample_count()) < 2 {
            assert!(start.elapsed() < Duration::from_secs(5));
            std::thread::sleep(Duration::from_millis(5));
        }
        procs.clean_up();
        assert!(procs.thread.is_none());
    }
}

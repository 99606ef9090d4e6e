//! Set of per-CPU instances plus the aggregate, sampled in the background.

use super::instance::CpuInstance;
use crate::collector::CpuDependencies;
use crate::collector::procfs::{CpuRow, count_physical_ids, parse_cpu_line};
use crate::config::SamplingConfig;
use crate::error::{PalError, Result};
use crate::sampler::SamplerThread;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug)]
struct CpuSet {
    instances: Vec<CpuInstance>,
    total: CpuInstance,
}

struct CpuShared {
    deps: Arc<dyn CpuDependencies>,
    history: usize,
    set: Mutex<CpuSet>,
}

impl CpuShared {
    fn reconcile(&self, count: usize) -> Result<()> {
        let mut set = self.set.lock();

        for proc_number in set.instances.len()..count {
            debug!(proc_number, "adding CPU instance");
            set.instances.push(CpuInstance::new(proc_number, self.history));
        }

        // Removal assumes contiguous zero-based indices: the excess entry is
        // always the highest index.
        while count < set.instances.len() {
            let highest = set.instances.len() - 1;
            let Some(pos) = set
                .instances
                .iter()
                .position(|c| c.proc_number() == highest)
            else {
                return Err(PalError::internal(
                    "CpuEnumeration::update",
                    format!("no CPU instance with index {} to remove", highest),
                ));
            };
            debug!(proc_number = highest, "removing CPU instance");
            set.instances.remove(pos);
        }

        Ok(())
    }

    fn sample_data(&self) -> Result<()> {
        let content = self.deps.proc_stat()?;
        let now = Instant::now();

        let mut set = self.set.lock();
        for line in content.lines() {
            match parse_cpu_line(line) {
                None => {}
                Some(Err(e)) => error!(line, error = %e, "malformed cpu row in /proc/stat"),
                Some(Ok((CpuRow::Total, ticks))) => set.total.record(&ticks, now),
                Some(Ok((CpuRow::Cpu(n), ticks))) => {
                    match set.instances.iter_mut().find(|c| c.proc_number() == n) {
                        Some(cpu) => cpu.record(&ticks, now),
                        None => error!(proc_number = n, "no CPU instance for /proc/stat row"),
                    }
                }
            }
        }
        trace!(cpus = set.instances.len(), "CPU ticks sampled");
        Ok(())
    }
}

/// Owns one [`CpuInstance`] per online logical processor and the total.
pub struct CpuEnumeration {
    shared: Arc<CpuShared>,
    config: SamplingConfig,
    thread: Option<SamplerThread>,
}

impl CpuEnumeration {
    pub fn new(deps: Arc<dyn CpuDependencies>, config: SamplingConfig) -> Self {
        Self {
            shared: Arc::new(CpuShared {
                deps,
                history: config.history,
                set: Mutex::new(CpuSet {
                    instances: Vec::new(),
                    total: CpuInstance::new_total(config.history),
                }),
            }),
            config,
            thread: None,
        }
    }

    /// Builds the instance set and starts the tick sampling thread.
    pub fn init(&mut self) -> Result<()> {
        self.update(false)?;

        let shared = self.shared.clone();
        let thread = SamplerThread::spawn("syspal-cpu", self.config.interval, move || {
            if let Err(e) = shared.sample_data() {
                warn!(error = %e, "CPU sampling pass failed");
            }
        })?;
        self.thread = Some(thread);
        info!(cpus = self.size(), interval = ?self.config.interval, "CPU enumeration started");
        Ok(())
    }

    /// Reconciles instances with the online processor count and, when
    /// `update_instances` is set, pulls fresh ticks.
    pub fn update(&self, update_instances: bool) -> Result<()> {
        let count = self.shared.deps.processors_online()?;
        self.shared.reconcile(count)?;
        if update_instances {
            self.shared.sample_data()?;
        }
        Ok(())
    }

    /// Reads `/proc/stat` once and pushes one sample per counter.
    pub fn sample_data(&self) -> Result<()> {
        self.shared.sample_data()
    }

    /// Stops the sampling thread.
    pub fn clean_up(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
        }
    }

    /// Number of per-CPU instances (the total is not counted).
    pub fn size(&self) -> usize {
        self.shared.set.lock().instances.len()
    }

    /// Snapshot of the per-CPU instances.
    pub fn instances(&self) -> Vec<CpuInstance> {
        self.shared.set.lock().instances.clone()
    }

    pub fn instance(&self, proc_number: usize) -> Option<CpuInstance> {
        self.shared
            .set
            .lock()
            .instances
            .iter()
            .find(|c| c.proc_number() == proc_number)
            .cloned()
    }

    /// Snapshot of the aggregate instance.
    pub fn total(&self) -> CpuInstance {
        self.shared.set.lock().total.clone()
    }

    pub fn processor_count_logical(deps: &dyn CpuDependencies) -> Result<usize> {
        deps.processors_online()
    }

    /// Distinct physical packages listed in `/proc/cpuinfo`.
    pub fn processor_count_physical(deps: &dyn CpuDependencies) -> Result<usize> {
        Ok(count_physical_ids(&deps.cpuinfo()?))
    }
}

impl Drop for CpuEnumeration {
    fn drop(&mut self) {
        self.clean_up();
    }
}

//! Physical memory, swap and paging rates.
//!
//! The physical and swap figures are a snapshot overwritten by every
//! [`MemoryInstance::update`]. Page reads and writes are averaged: a
//! background thread samples the cumulative `pgpgin`/`pgpgout` counters and
//! the getters divide the averaged delta by the sampling interval.

use crate::collector::MemoryDependencies;
use crate::collector::procfs::{PagingCounters, parse_meminfo, parse_vmstat_paging};
use crate::config::SamplingConfig;
use crate::error::{PalError, Result};
use crate::sampler::{SampleHistory, SamplerThread};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Last values read from `/proc/meminfo`, in MB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub total_physical: u64,
    pub available: u64,
    pub used: u64,
    pub total_swap: u64,
    pub available_swap: u64,
    pub used_swap: u64,
}

#[derive(Debug)]
struct PagingHistory {
    reads: SampleHistory,
    writes: SampleHistory,
}

struct Paging {
    deps: Arc<dyn MemoryDependencies>,
    interval: Duration,
    history: Mutex<PagingHistory>,
}

impl Paging {
    fn sample(&self) -> Result<()> {
        let counters = read_paging(self.deps.as_ref())?;
        let mut history = self.history.lock();
        history.reads.add_sample(counters.pgpgin);
        history.writes.add_sample(counters.pgpgout);
        Ok(())
    }

    fn rate(&self, pick: impl Fn(&PagingHistory) -> &SampleHistory) -> f64 {
        let secs = self.interval.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        let history = self.history.lock();
        let h = pick(&history);
        h.average_delta(h.capacity()) / secs
    }
}

fn read_paging(deps: &dyn MemoryDependencies) -> Result<PagingCounters> {
    parse_vmstat_paging(&deps.vmstat()?)
        .map_err(|e| PalError::internal("parse_vmstat_paging", e.message))
}

/// The memory subsystem. One per process.
pub struct MemoryInstance {
    deps: Arc<dyn MemoryDependencies>,
    snapshot: MemorySnapshot,
    paging: Arc<Paging>,
    thread: Option<SamplerThread>,
}

impl MemoryInstance {
    pub fn new(deps: Arc<dyn MemoryDependencies>, config: SamplingConfig) -> Self {
        let paging = Paging {
            deps: deps.clone(),
            interval: config.interval,
            history: Mutex::new(PagingHistory {
                reads: SampleHistory::new(config.history),
                writes: SampleHistory::new(config.history),
            }),
        };
        Self {
            deps,
            snapshot: MemorySnapshot::default(),
            paging: Arc::new(paging),
            thread: None,
        }
    }

    /// Reads the snapshot once and starts the paging thread.
    pub fn init(&mut self) -> Result<()> {
        self.update()?;

        let paging = self.paging.clone();
        let thread = SamplerThread::spawn("syspal-memory", paging.interval, move || {
            if let Err(e) = paging.sample() {
                warn!(error = %e, "paging sampling pass failed");
            }
        })?;
        self.thread = Some(thread);
        info!(
            total_mb = self.snapshot.total_physical,
            interval = ?self.paging.interval,
            "memory instance started"
        );
        Ok(())
    }

    /// Refreshes physical and swap figures from `/proc/meminfo`.
    pub fn update(&mut self) -> Result<()> {
        let info = parse_meminfo(&self.deps.meminfo()?);
        let missing = info.missing_keys();
        if !missing.is_empty() {
            warn!(?missing, "keys missing from /proc/meminfo");
        }

        let to_mb = |kb: u64| kb / 1024;
        let total = info.mem_total.unwrap_or(0);
        let available = info.mem_free.unwrap_or(0) + info.buffers + info.cached;
        let swap_total = info.swap_total.unwrap_or(0);
        let swap_free = info.swap_free.unwrap_or(0);

        self.snapshot = MemorySnapshot {
            total_physical: to_mb(total),
            available: to_mb(available),
            used: to_mb(total.saturating_sub(available)),
            total_swap: to_mb(swap_total),
            available_swap: to_mb(swap_free),
            used_swap: to_mb(swap_total.saturating_sub(swap_free)),
        };
        debug!(snapshot = ?self.snapshot, "memory snapshot updated");
        Ok(())
    }

    /// Runs one paging sample outside the background thread.
    pub fn sample_paging(&self) -> Result<()> {
        self.paging.sample()
    }

    /// Stops the paging thread.
    pub fn clean_up(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
        }
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        self.snapshot
    }

    pub fn total_physical_memory(&self) -> Option<u64> {
        Some(self.snapshot.total_physical)
    }

    pub fn available_memory(&self) -> Option<u64> {
        Some(self.snapshot.available)
    }

    pub fn used_memory(&self) -> Option<u64> {
        Some(self.snapshot.used)
    }

    /// Memory reserved by the kernel. Linux does not report it.
    pub fn reserved_memory(&self) -> Option<u64> {
        None
    }

    pub fn total_swap(&self) -> Option<u64> {
        Some(self.snapshot.total_swap)
    }

    pub fn available_swap(&self) -> Option<u64> {
        Some(self.snapshot.available_swap)
    }

    pub fn used_swap(&self) -> Option<u64> {
        Some(self.snapshot.used_swap)
    }

    /// Pages read per second, averaged over the retained history.
    pub fn page_reads(&self) -> Option<f64> {
        Some(self.paging.rate(|h| &h.reads))
    }

    /// Pages written per second, averaged over the retained history.
    pub fn page_writes(&self) -> Option<f64> {
        Some(self.paging.rate(|h| &h.writes))
    }

    /// Cumulative `(pgpgin, pgpgout)` since boot.
    pub fn paging_since_boot(deps: &dyn MemoryDependencies) -> Result<(u64, u64)> {
        let counters = read_paging(deps)?;
        Ok((counters.pgpgin, counters.pgpgout))
    }
}

impl Drop for MemoryInstance {
    fn drop(&mut self) {
        self.clean_up();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{LinuxDeps, MockFs};
    use std::time::Instant;

    fn instance(fs: &MockFs, interval: Duration, history: usize) -> MemoryInstance {
        let deps = LinuxDeps::new(fs.clone(), "/proc");
        MemoryInstance::new(Arc::new(deps), SamplingConfig::new(interval, history))
    }

    #[test]
    fn test_snapshot_from_meminfo() {
        let fs = MockFs::typical_system();
        let mut memory = instance(&fs, Duration::from_secs(60), 6);
        memory.update().unwrap();

        // 16384000 kB total, 8192000 + 512000 + 2048000 kB available
        assert_eq!(memory.total_physical_memory(), Some(16000));
        assert_eq!(memory.available_memory(), Some(10500));
        assert_eq!(memory.used_memory(), Some(5500));
        assert_eq!(memory.total_swap(), Some(4000));
        assert_eq!(memory.available_swap(), Some(3000));
        assert_eq!(memory.used_swap(), Some(1000));
        assert_eq!(memory.reserved_memory(), None);
    }

    #[test]
    fn test_page_reads_rate() {
        let fs = MockFs::new();
        fs.add_file(
            "/proc/meminfo",
            "MemTotal: 1048576 kB\nMemFree: 524288 kB\nSwapTotal: 0 kB\nSwapFree: 0 kB\n",
        );
        fs.add_file("/proc/vmstat", "pgpgin 1000\npgpgout 400\n");
        let mut memory = instance(&fs, Duration::from_secs(10), 6);
        memory.update().unwrap();
        assert_eq!(memory.total_physical_memory(), Some(1024));

        memory.sample_paging().unwrap();
        fs.add_file("/proc/vmstat", "pgpgin 1050\npgpgout 420\n");
        memory.sample_paging().unwrap();

        assert_eq!(memory.page_reads(), Some(5.0));
        assert_eq!(memory.page_writes(), Some(2.0));
    }

    #[test]
    fn test_page_rate_without_history_is_zero() {
        let fs = MockFs::typical_system();
        let memory = instance(&fs, Duration::from_secs(60), 6);
        assert_eq!(memory.page_reads(), Some(0.0));
        memory.sample_paging().unwrap();
        assert_eq!(memory.page_writes(), Some(0.0));
    }

    #[test]
    fn test_missing_keys_still_update() {
        let fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 2048 kB\n");
        let mut memory = instance(&fs, Duration::from_secs(60), 6);
        memory.update().unwrap();
        assert_eq!(memory.total_physical_memory(), Some(2));
        assert_eq!(memory.used_memory(), Some(2));
        assert_eq!(memory.total_swap(), Some(0));
    }

    #[test]
    fn test_malformed_vmstat_is_internal_error() {
        let fs = MockFs::new();
        fs.add_file("/proc/vmstat", "nr_free_pages 1\n");
        let memory = instance(&fs, Duration::from_secs(60), 6);
        assert!(matches!(
            memory.sample_paging(),
            Err(PalError::InternalError { .. })
        ));
    }

    #[test]
    fn test_paging_since_boot() {
        let deps = LinuxDeps::new(MockFs::typical_system(), "/proc");
        assert_eq!(
            MemoryInstance::paging_since_boot(&deps).unwrap(),
            (123456, 654321)
        );
    }

    #[test]
    fn test_init_samples_paging_in_background() {
        let fs = MockFs::typical_system();
        let mut memory = instance(&fs, Duration::from_millis(10), 6);
        memory.init().unwrap();

        let start = Instant::now();
        while memory.paging.history.lock().reads.len() < 2 {
            assert!(start.elapsed() < Duration::from_secs(5));
            std::thread::sleep(Duration::from_millis(5));
        }
        memory.clean_up();
        assert!(memory.thread.is_none());
    }
}

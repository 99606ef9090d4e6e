//! Periodic report assembled from the sampled families.

use chrono::{DateTime, Utc};
use serde::Serialize;
use syspal_core::cpu::{CpuInstance, CpuMetric};
use syspal_core::memory::MemorySnapshot;
use syspal_core::network::NetworkInterfaceInfo;
use syspal_core::process::{ExecutionState, ProcessInstance};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CpuReport {
    pub cpus: usize,
    pub busy_percent: Option<f64>,
    pub user_percent: Option<f64>,
    pub system_percent: Option<f64>,
    pub iowait_percent: Option<f64>,
}

impl CpuReport {
    /// Percentages over the whole history of the aggregate instance.
    pub fn from_total(total: &CpuInstance, cpus: usize) -> Self {
        let go_back = total.history(CpuMetric::Total).capacity();
        let ticks = total.tick_deltas(go_back);
        Self {
            cpus,
            busy_percent: ticks.percent_busy(),
            user_percent: ticks.percent(CpuMetric::User),
            system_percent: ticks.percent(CpuMetric::System),
            iowait_percent: ticks.percent(CpuMetric::IoWait),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryReport {
    #[serde(flatten)]
    pub snapshot: MemorySnapshot,
    pub page_reads_per_sec: Option<f64>,
    pub page_writes_per_sec: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessRow {
    pub pid: u32,
    pub name: Option<String>,
    pub state: Option<ExecutionState>,
    pub cpu_percent: Option<f64>,
    pub used_memory_kb: Option<u64>,
    pub user_mode_ms: Option<u64>,
    pub kernel_mode_ms: Option<u64>,
}

impl ProcessRow {
    pub fn from_instance(process: &ProcessInstance) -> Self {
        Self {
            pid: process.pid(),
            name: process.name(),
            state: process.execution_state(),
            cpu_percent: process.cpu_time(),
            used_memory_kb: process.used_memory(),
            user_mode_ms: process.user_mode_time(),
            kernel_mode_ms: process.kernel_mode_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuReport,
    pub memory: MemoryReport,
    pub process_count: usize,
    pub top_processes: Vec<ProcessRow>,
    pub interfaces: Vec<NetworkInterfaceInfo>,
}

/// The `n` processes with the highest CPU share, busiest first. Ties keep
/// pid order.
pub fn top_processes(processes: &[ProcessInstance], n: usize) -> Vec<ProcessRow> {
    let mut rows: Vec<ProcessRow> = processes.iter().map(ProcessRow::from_instance).collect();
    rows.sort_by(|a, b| {
        let a = a.cpu_percent.unwrap_or(0.0);
        let b = b.cpu_percent.unwrap_or(0.0);
        b.total_cmp(&a)
    });
    rows.truncate(n);
    rows
}

/// One-line summary for the text log.
pub fn describe(report: &Report) -> String {
    let busy = match report.cpu.busy_percent {
        Some(p) => format!("{:.1}%", p),
        None => "n/a".to_string(),
    };
    format!(
        "{} cpus busy {}, memory {}/{} MB, swap {}/{} MB, {} processes, {} interfaces",
        report.cpu.cpus,
        busy,
        report.memory.snapshot.used,
        report.memory.snapshot.total_physical,
        report.memory.snapshot.used_swap,
        report.memory.snapshot.total_swap,
        report.process_count,
        report.interfaces.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use syspal_core::collector::mock::stat_line;
    use syspal_core::collector::{LinuxDeps, MockFs, MockSysconf};
    use syspal_core::config::SamplingConfig;
    use syspal_core::process::ProcessEnumeration;

    #[test]
    fn cpu_report_from_two_samples() {
        let mut total = CpuInstance::new_total(7);
        for (metric, first, second) in [
            (CpuMetric::User, 100, 110),
            (CpuMetric::System, 50, 55),
            (CpuMetric::Idle, 850, 935),
            (CpuMetric::Total, 1000, 1100),
        ] {
            total.add_sample(metric, first);
            total.add_sample(metric, second);
        }

        let report = CpuReport::from_total(&total, 4);
        assert_eq!(report.cpus, 4);
        assert_eq!(report.busy_percent, Some(15.0));
        assert_eq!(report.user_percent, Some(10.0));
        assert_eq!(report.iowait_percent, Some(0.0));
    }

    #[test]
    fn top_processes_orders_and_truncates() {
        let fs = MockFs::typical_system();
        let deps = LinuxDeps::new(fs.clone(), "/proc").with_sysconf(MockSysconf::new());
        let procs = ProcessEnumeration::new(
            Arc::new(deps),
            SamplingConfig::new(Duration::from_secs(60), 2),
        );
        procs.sample_data().unwrap();
        fs.add_file("/proc/1234/stat", stat_line(1234, "bash", 'R', 500, 5, 12345));
        std::thread::sleep(Duration::from_millis(20));
        procs.sample_data().unwrap();
        procs.update(true).unwrap();

        let rows = top_processes(&procs.instances(), 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pid, 1234);
        assert_eq!(rows[0].state, Some(ExecutionState::Running));
        assert!(rows[0].cpu_percent.unwrap() > 0.0);
    }

    #[test]
    fn describe_lists_every_family() {
        let report = Report {
            timestamp: Utc::now(),
            cpu: CpuReport {
                cpus: 4,
                busy_percent: Some(12.5),
                ..Default::default()
            },
            memory: MemoryReport {
                snapshot: MemorySnapshot {
                    total_physical: 16000,
                    used: 5500,
                    ..Default::default()
                },
                ..Default::default()
            },
            process_count: 3,
            top_processes: Vec::new(),
            interfaces: vec![NetworkInterfaceInfo::default()],
        };

        let desc = describe(&report);
        assert!(desc.contains("4 cpus busy 12.5%"));
        assert!(desc.contains("memory 5500/16000 MB"));
        assert!(desc.contains("3 processes"));
        assert!(desc.contains("1 interfaces"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["memory"]["total_physical"], 16000);
        assert_eq!(json["process_count"], 3);
    }
}

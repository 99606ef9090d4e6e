//! One logical CPU (or the aggregate of all of them).

use crate::collector::procfs::CpuTickRow;
use crate::sampler::SampleHistory;
use serde::Serialize;
use std::time::Instant;

/// Tick counters kept per CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CpuMetric {
    User,
    Nice,
    System,
    Idle,
    IoWait,
    Irq,
    SoftIrq,
    /// Sum of the seven counters above.
    Total,
}

impl CpuMetric {
    pub const ALL: [CpuMetric; 8] = [
        CpuMetric::User,
        CpuMetric::Nice,
        CpuMetric::System,
        CpuMetric::Idle,
        CpuMetric::IoWait,
        CpuMetric::Irq,
        CpuMetric::SoftIrq,
        CpuMetric::Total,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Tick deltas of one CPU over a window, ready for percentage math.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub total: u64,
}

impl CpuTicks {
    fn get(&self, metric: CpuMetric) -> u64 {
        match metric {
            CpuMetric::User => self.user,
            CpuMetric::Nice => self.nice,
            CpuMetric::System => self.system,
            CpuMetric::Idle => self.idle,
            CpuMetric::IoWait => self.iowait,
            CpuMetric::Irq => self.irq,
            CpuMetric::SoftIrq => self.softirq,
            CpuMetric::Total => self.total,
        }
    }

    /// `(total - idle) / total` as a percentage; `None` before two samples.
    pub fn percent_busy(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let busy = self.total.saturating_sub(self.idle);
        Some(busy as f64 * 100.0 / self.total as f64)
    }

    /// Share of the window spent in `metric`, as a percentage.
    pub fn percent(&self, metric: CpuMetric) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.get(metric) as f64 * 100.0 / self.total as f64)
    }
}

/// Sample histories of one CPU.
#[derive(Debug, Clone)]
pub struct CpuInstance {
    proc_number: usize,
    is_total: bool,
    histories: [SampleHistory; 8],
}

impl CpuInstance {
    pub fn new(proc_number: usize, history: usize) -> Self {
        Self {
            proc_number,
            is_total: false,
            histories: std::array::from_fn(|_| SampleHistory::new(history)),
        }
    }

    /// The aggregate instance fed by the `cpu` row.
    pub fn new_total(history: usize) -> Self {
        Self {
            is_total: true,
            ..Self::new(0, history)
        }
    }

    /// Logical processor index. Meaningless for the total instance.
    pub fn proc_number(&self) -> usize {
        self.proc_number
    }

    pub fn is_total(&self) -> bool {
        self.is_total
    }

    /// `_Total` for the aggregate, the processor index otherwise.
    pub fn name(&self) -> String {
        if self.is_total {
            "_Total".to_string()
        } else {
            self.proc_number.to_string()
        }
    }

    /// Pushes one cumulative tick value into the history of `metric`.
    pub fn add_sample(&mut self, metric: CpuMetric, value: u64) {
        self.histories[metric.index()].add_sample(value);
    }

    /// Records a whole `/proc/stat` row with one timestamp.
    pub(crate) fn record(&mut self, ticks: &CpuTickRow, taken_at: Instant) {
        let values = [
            ticks.user,
            ticks.nice,
            ticks.system,
            ticks.idle,
            ticks.iowait,
            ticks.irq,
            ticks.softirq,
            ticks.total(),
        ];
        for (history, value) in self.histories.iter_mut().zip(values) {
            history.add_sample_at(value, taken_at);
        }
    }

    pub fn history(&self, metric: CpuMetric) -> &SampleHistory {
        &self.histories[metric.index()]
    }

    pub fn delta(&self, metric: CpuMetric, go_back: usize) -> u64 {
        self.history(metric).delta(go_back)
    }

    /// Deltas of every counter over the same window.
    pub fn tick_deltas(&self, go_back: usize) -> CpuTicks {
        let d = |metric| self.delta(metric, go_back);
        CpuTicks {
            user: d(CpuMetric::User),
            nice: d(CpuMetric::Nice),
            system: d(CpuMetric::System),
            idle: d(CpuMetric::Idle),
            iowait: d(CpuMetric::IoWait),
            irq: d(CpuMetric::Irq),
            softirq: d(CpuMetric::SoftIrq),
            total: d(CpuMetric::Total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sample_per_metric() {
        let mut cpu = CpuInstance::new(2, 4);
        cpu.add_sample(CpuMetric::User, 100);
        cpu.add_sample(CpuMetric::User, 130);
        cpu.add_sample(CpuMetric::Idle, 900);

        assert_eq!(cpu.delta(CpuMetric::User, 1), 30);
        assert_eq!(cpu.delta(CpuMetric::Idle, 1), 0);
        assert_eq!(cpu.history(CpuMetric::System).len(), 0);
        assert_eq!(cpu.name(), "2");
    }

    #[test]
    fn test_record_fills_total() {
        let mut cpu = CpuInstance::new_total(3);
        let now = Instant::now();
        cpu.record(
            &CpuTickRow {
                user: 1,
                nice: 2,
                system: 3,
                idle: 4,
                iowait: 5,
                irq: 6,
                softirq: 7,
            },
            now,
        );
        assert_eq!(cpu.history(CpuMetric::Total).latest().map(|s| s.value), Some(28));
        assert!(cpu.is_total());
        assert_eq!(cpu.name(), "_Total");
    }

    #[test]
    fn test_percent_busy() {
        let ticks = CpuTicks {
            user: 10,
            system: 5,
            idle: 85,
            total: 100,
            ..Default::default()
        };
        assert_eq!(ticks.percent_busy(), Some(15.0));
        assert_eq!(ticks.percent(CpuMetric::User), Some(10.0));
        assert_eq!(CpuTicks::default().percent_busy(), None);
    }
}

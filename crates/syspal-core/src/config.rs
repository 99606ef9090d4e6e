//! Sampling cadence and history sizes for each metric family.

use std::time::Duration;

/// How often a background thread samples and how many samples it keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingConfig {
    /// Time between two acquisition passes.
    pub interval: Duration,
    /// Capacity of every `SampleHistory` the family owns.
    pub history: usize,
}

impl SamplingConfig {
    pub const fn new(interval: Duration, history: usize) -> Self {
        Self { interval, history }
    }
}

/// Defaults: CPU ticks every 10 s keeping roughly a minute of history,
/// paging counters every 60 s over six samples, processes every 60 s
/// with the last two samples.
pub const DEFAULT_CPU: SamplingConfig = SamplingConfig::new(Duration::from_secs(10), 7);
pub const DEFAULT_MEMORY: SamplingConfig = SamplingConfig::new(Duration::from_secs(60), 6);
pub const DEFAULT_PROCESS: SamplingConfig = SamplingConfig::new(Duration::from_secs(60), 2);

/// Configuration for the whole abstraction layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalConfig {
    /// Root of the proc filesystem.
    pub proc_path: String,
    pub cpu: SamplingConfig,
    pub memory: SamplingConfig,
    pub process: SamplingConfig,
}

impl Default for PalConfig {
    fn default() -> Self {
        Self {
            proc_path: "/proc".to_string(),
            cpu: DEFAULT_CPU,
            memory: DEFAULT_MEMORY,
            process: DEFAULT_PROCESS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PalConfig::default();
        assert_eq!(config.proc_path, "/proc");
        assert_eq!(config.cpu.interval, Duration::from_secs(10));
        assert_eq!(config.memory.history, 6);
        assert_eq!(config.process.history, 2);
    }
}

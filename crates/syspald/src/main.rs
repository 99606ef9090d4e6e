//! syspald - System metrics sampling daemon.
//!
//! Runs the CPU, memory and process samplers in the background and
//! periodically reports what they collected, either as log lines or as one
//! JSON object per line.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod report;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use syspal_core::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use syspal_core::collector::mock::MockFs;
use syspal_core::collector::{
    CpuDependencies, LinuxDeps, MemoryDependencies, NetworkInterfaceDependencies,
    ProcessDependencies,
};
use syspal_core::config::{PalConfig, SamplingConfig};
use syspal_core::cpu::CpuEnumeration;
use syspal_core::memory::MemoryInstance;
use syspal_core::network::NetworkInterfaceEnumeration;
use syspal_core::process::ProcessEnumeration;

use report::{CpuReport, MemoryReport, Report, describe, top_processes};

/// System metrics sampling daemon.
#[derive(Parser)]
#[command(name = "syspald", about = "System metrics sampling daemon", version)]
struct Args {
    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// CPU tick sampling interval in seconds.
    #[arg(long, default_value = "10")]
    cpu_interval: u64,

    /// Paging counter sampling interval in seconds.
    #[arg(long, default_value = "60")]
    memory_interval: u64,

    /// Process sampling interval in seconds.
    #[arg(long, default_value = "60")]
    process_interval: u64,

    /// Seconds between two reports.
    #[arg(short, long, default_value = "10")]
    report_interval: u64,

    /// Number of processes listed in each report, busiest first.
    #[arg(long, default_value = "5")]
    top: usize,

    /// Print each report as one JSON line on stdout.
    #[arg(long)]
    json: bool,

    /// Exit after the first report.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn pal_config(&self) -> PalConfig {
        let defaults = PalConfig::default();
        PalConfig {
            proc_path: self.proc_path.clone(),
            cpu: SamplingConfig::new(Duration::from_secs(self.cpu_interval), defaults.cpu.history),
            memory: SamplingConfig::new(
                Duration::from_secs(self.memory_interval),
                defaults.memory.history,
            ),
            process: SamplingConfig::new(
                Duration::from_secs(self.process_interval),
                defaults.process.history,
            ),
        }
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["syspald", "syspal_core"] {
        match format!("{}={}", target, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("invalid log directive for {}: {}", target, e),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Everything the daemon samples.
struct Families {
    cpus: CpuEnumeration,
    memory: MemoryInstance,
    processes: ProcessEnumeration,
    interfaces: NetworkInterfaceEnumeration,
}

impl Families {
    fn start<D>(deps: Arc<D>, config: &PalConfig) -> syspal_core::Result<Self>
    where
        D: CpuDependencies
            + MemoryDependencies
            + ProcessDependencies
            + NetworkInterfaceDependencies
            + 'static,
    {
        let mut cpus = CpuEnumeration::new(deps.clone(), config.cpu);
        cpus.init()?;
        let mut memory = MemoryInstance::new(deps.clone(), config.memory);
        memory.init()?;
        let mut processes = ProcessEnumeration::new(deps.clone(), config.process);
        processes.init()?;
        let mut interfaces = NetworkInterfaceEnumeration::new(deps);
        interfaces.init()?;
        Ok(Self {
            cpus,
            memory,
            processes,
            interfaces,
        })
    }

    /// Refreshes the on-demand values and assembles a report.
    fn report(&mut self, top: usize) -> Report {
        if let Err(e) = self.memory.update() {
            warn!("Memory update failed: {}", e);
        }
        if let Err(e) = self.interfaces.update(false) {
            warn!("Network interface update failed: {}", e);
        }
        if let Err(e) = self.processes.update(true) {
            warn!("Process update failed: {}", e);
        }

        let processes = self.processes.instances();
        Report {
            timestamp: Utc::now(),
            cpu: CpuReport::from_total(&self.cpus.total(), self.cpus.size()),
            memory: MemoryReport {
                snapshot: self.memory.snapshot(),
                page_reads_per_sec: self.memory.page_reads(),
                page_writes_per_sec: self.memory.page_writes(),
            },
            process_count: processes.len(),
            top_processes: top_processes(&processes, top),
            interfaces: self
                .interfaces
                .instances()
                .iter()
                .map(|i| i.info().clone())
                .collect(),
        }
    }

    fn clean_up(&mut self) {
        self.cpus.clean_up();
        self.memory.clean_up();
        self.processes.clean_up();
    }
}

fn emit(report: &Report, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize report: {}", e),
        }
        return;
    }

    info!("{}", describe(report));
    for row in &report.top_processes {
        info!(
            "  pid {} {} cpu={:.1}% rss={}kB",
            row.pid,
            row.name.as_deref().unwrap_or("?"),
            row.cpu_percent.unwrap_or(0.0),
            row.used_memory_kb.unwrap_or(0)
        );
    }
    for interface in &report.interfaces {
        debug!(
            "  {} rx={} tx={} ip={}",
            interface.name,
            interface.bytes_received.unwrap_or(0),
            interface.bytes_sent.unwrap_or(0),
            interface
                .ip_address
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = args.pal_config();
    info!("syspald {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: proc={}, cpu={:?}, memory={:?}, process={:?}, report={}s",
        config.proc_path,
        config.cpu.interval,
        config.memory.interval,
        config.process.interval,
        args.report_interval
    );

    #[cfg(target_os = "linux")]
    let deps = Arc::new(LinuxDeps::new(RealFs::new(), &config.proc_path));
    #[cfg(not(target_os = "linux"))]
    let deps = Arc::new(LinuxDeps::new(MockFs::typical_system(), &config.proc_path));

    let mut families = match Families::start(deps, &config) {
        Ok(families) => families,
        Err(e) => {
            error!("Failed to start samplers: {}", e);
            std::process::exit(1);
        }
    };

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting report loop");

    let interval = Duration::from_secs(args.report_interval);
    while running.load(Ordering::SeqCst) {
        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let report = families.report(args.top);
        emit(&report, args.json);

        if args.once {
            break;
        }
    }

    info!("Shutting down...");
    families.clean_up();
    info!("Shutdown complete");
}

//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of various `/proc` files
//! into structured data. They are designed to be easily testable with string inputs.

use std::collections::BTreeSet;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Parsed data from `/proc/[pid]/stat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcStat {
    pub pid: u32,
    pub comm: String,
    pub state: char,
    pub ppid: u32,
    pub pgrp: i32,
    pub session: i32,
    pub tty_nr: i32,
    pub majflt: u64,
    pub utime: u64,
    pub stime: u64,
    pub cutime: i64,
    pub cstime: i64,
    pub priority: i32,
    pub nice: i32,
    pub num_threads: i32,
    pub starttime: u64,
    pub vsize: u64,
    pub rss: i64,
}

/// Parses `/proc/[pid]/stat` content.
///
/// The format is tricky because the comm field can contain spaces and parentheses.
/// Format: pid (comm) state ppid pgrp session tty_nr ...
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    // Find the comm field boundaries (enclosed in parentheses)
    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;

    let comm = content[open_paren + 1..close_paren].to_string();

    // Fields after the closing ')', starting with state
    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();

    if fields.len() < 22 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 22+, got {}",
            fields.len()
        )));
    }

    let parse_field = |idx: usize, name: &str| -> Result<i64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    let parse_field_u64 = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcStat {
        pid,
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        ppid: parse_field(1, "ppid")? as u32,
        pgrp: parse_field(2, "pgrp")? as i32,
        session: parse_field(3, "session")? as i32,
        tty_nr: parse_field(4, "tty_nr")? as i32,
        majflt: parse_field_u64(9, "majflt")?,
        utime: parse_field_u64(11, "utime")?,
        stime: parse_field_u64(12, "stime")?,
        cutime: parse_field(13, "cutime")?,
        cstime: parse_field(14, "cstime")?,
        priority: parse_field(15, "priority")? as i32,
        nice: parse_field(16, "nice")? as i32,
        num_threads: parse_field(17, "num_threads")? as i32,
        starttime: parse_field_u64(19, "starttime")?,
        vsize: parse_field_u64(20, "vsize")?,
        rss: parse_field(21, "rss")?,
    })
}

/// Parsed data from `/proc/[pid]/statm`, all values in pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcStatm {
    pub shared: u64,
    pub text: u64,
    pub data: u64,
}

/// Parses `/proc/[pid]/statm` content.
///
/// Format: size resident shared text lib data dt
pub fn parse_proc_statm(content: &str) -> Result<ProcStatm, ParseError> {
    let values = content
        .split_whitespace()
        .map(|s| s.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ParseError::new("invalid number in statm"))?;

    if values.len() < 6 {
        return Err(ParseError::new(format!(
            "not enough fields in statm: expected 6+, got {}",
            values.len()
        )));
    }

    Ok(ProcStatm {
        shared: values[2],
        text: values[3],
        data: values[5],
    })
}

/// Parsed data from `/proc/[pid]/io`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcIo {
    /// Read syscalls issued.
    pub syscr: u64,
    /// Write syscalls issued.
    pub syscw: u64,
}

/// Parses `/proc/[pid]/io` content.
///
/// Format is key: value pairs, one per line.
pub fn parse_proc_io(content: &str) -> ProcIo {
    let mut io = ProcIo::default();

    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let value: u64 = value.trim().parse().unwrap_or(0);
            match key.trim() {
                "syscr" => io.syscr = value,
                "syscw" => io.syscw = value,
                _ => {}
            }
        }
    }

    io
}

/// Parsed data from `/proc/meminfo`, in kB.
///
/// The mandatory keys are optional here so the caller can report which one
/// was missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub mem_total: Option<u64>,
    pub mem_free: Option<u64>,
    pub buffers: u64,
    pub cached: u64,
    pub swap_total: Option<u64>,
    pub swap_free: Option<u64>,
}

impl MemInfo {
    /// Names of the mandatory keys absent from the file.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        [
            ("MemTotal", self.mem_total),
            ("MemFree", self.mem_free),
            ("SwapTotal", self.swap_total),
            ("SwapFree", self.swap_free),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| k)
        .collect()
    }
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> MemInfo {
    let mut info = MemInfo::default();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.parse::<u64>() else {
            continue;
        };
        match key {
            "MemTotal:" => info.mem_total = Some(value),
            "MemFree:" => info.mem_free = Some(value),
            "Buffers:" => info.buffers = value,
            "Cached:" => info.cached = value,
            "SwapTotal:" => info.swap_total = Some(value),
            "SwapFree:" => info.swap_free = Some(value),
            _ => {}
        }
    }

    info
}

/// Cumulative paging counters from `/proc/vmstat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingCounters {
    pub pgpgin: u64,
    pub pgpgout: u64,
}

/// Parses the paging counters out of `/proc/vmstat`.
///
/// Format: key value (one per line)
pub fn parse_vmstat_paging(content: &str) -> Result<PagingCounters, ParseError> {
    let mut pgpgin = None;
    let mut pgpgout = None;

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        match parts[0] {
            "pgpgin" => pgpgin = parts[1].parse().ok(),
            "pgpgout" => pgpgout = parts[1].parse().ok(),
            _ => {}
        }
    }

    match (pgpgin, pgpgout) {
        (Some(pgpgin), Some(pgpgout)) => Ok(PagingCounters { pgpgin, pgpgout }),
        _ => Err(ParseError::new("pgpgin/pgpgout missing in vmstat")),
    }
}

/// Which row of `/proc/stat` a tick line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuRow {
    Total,
    Cpu(usize),
}

/// Cumulative tick counters of one `cpu` row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTickRow {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl CpuTickRow {
    /// Sum of every column, saturating on corrupt rows.
    pub fn total(&self) -> u64 {
        [self.nice, self.system, self.idle, self.iowait, self.irq, self.softirq]
            .into_iter()
            .fold(self.user, u64::saturating_add)
    }
}

/// Parses one line of `/proc/stat` if it is a `cpu` row.
///
/// Returns `None` for non-cpu lines. A row needs at least 5 columns; the
/// iowait/irq/softirq columns are read only when the row has 8 or more.
pub fn parse_cpu_line(line: &str) -> Option<Result<(CpuRow, CpuTickRow), ParseError>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let name = *parts.first()?;
    let suffix = name.strip_prefix("cpu")?;

    let row = if suffix.is_empty() {
        CpuRow::Total
    } else {
        match suffix.parse() {
            Ok(n) => CpuRow::Cpu(n),
            Err(_) => return Some(Err(ParseError::new(format!("invalid cpu row '{}'", name)))),
        }
    };

    if parts.len() < 5 {
        return Some(Err(ParseError::new(format!(
            "cpu row '{}' has {} columns, expected 5+",
            name,
            parts.len()
        ))));
    }

    Some(parse_ticks(&parts).map(|t| (row, t)))
}

fn parse_ticks(parts: &[&str]) -> Result<CpuTickRow, ParseError> {
    let value = |idx: usize| -> Result<u64, ParseError> {
        parts[idx].parse().map_err(|_| {
            ParseError::new(format!("invalid tick value '{}' in '{}'", parts[idx], parts[0]))
        })
    };

    let mut ticks = CpuTickRow {
        user: value(1)?,
        nice: value(2)?,
        system: value(3)?,
        idle: value(4)?,
        ..Default::default()
    };
    if parts.len() >= 8 {
        ticks.iowait = value(5)?;
        ticks.irq = value(6)?;
        ticks.softirq = value(7)?;
    }
    Ok(ticks)
}

/// Extracts `btime` (boot time, seconds since epoch) from `/proc/stat`.
pub fn parse_btime(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
}

/// Counts unique `physical id` entries in `/proc/cpuinfo`.
///
/// Physical ids are not necessarily contiguous, so this counts distinct
/// values rather than taking the maximum.
pub fn count_physical_ids(content: &str) -> usize {
    content
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| key.trim() == "physical id")
        .filter_map(|(_, value)| value.trim().parse::<u64>().ok())
        .collect::<BTreeSet<_>>()
        .len()
}

// ============ Network Device Stats Parser ============

/// Parsed data from `/proc/net/dev`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetDevStats {
    /// Interface name (eth0, lo, etc.)
    pub interface: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errs: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errs: u64,
    /// Collisions (transmit side `colls` column)
    pub collisions: u64,
}

/// Parses `/proc/net/dev` content.
///
/// Format:
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
pub fn parse_net_dev(content: &str) -> Vec<NetDevStats> {
    let mut devices = Vec::new();

    // The first two lines are the column header
    for line in content.lines().skip(2) {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };

        let values: Vec<&str> = rest.split_whitespace().collect();
        if values.len() < 14 {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { values.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(NetDevStats {
            interface: name.trim().to_string(),
            rx_bytes: get_val(0),
            rx_packets: get_val(1),
            rx_errs: get_val(2),
            tx_bytes: get_val(8),
            tx_packets: get_val(9),
            tx_errs: get_val(10),
            collisions: get_val(13),
        });
    }

    devices
}

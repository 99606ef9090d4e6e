//! Parsers for the Linux `/proc` filesystem.

pub mod parser;

pub use parser::{
    CpuRow, CpuTickRow, MemInfo, NetDevStats, PagingCounters, ParseError, ProcIo, ProcStat,
    ProcStatm, count_physical_ids, parse_btime, parse_cpu_line, parse_meminfo, parse_net_dev,
    parse_proc_io, parse_proc_stat, parse_proc_statm, parse_vmstat_paging,
};

//! Pre-built mock scenarios for testing.
//!
//! These provide realistic `/proc` states and interface tables for the
//! CPU, memory, process and network families.

use super::filesystem::MockFs;
use super::os::MockInterfaceControl;
use crate::collector::traits::InterfaceAttributes;
use std::net::Ipv4Addr;

/// `/proc/[pid]/stat` line with the given state and counters.
pub fn stat_line(pid: u32, comm: &str, state: char, utime: u64, stime: u64, starttime: u64) -> String {
    format!(
        "{pid} ({comm}) {state} 1 {pid} {pid} 34816 -1 4194304 500 0 3 0 {utime} {stime} 7 2 20 0 1 0 {starttime} 12345678 300 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0"
    )
}

/// `/proc/[pid]/io` content with the given syscall counters.
pub fn io_content(syscr: u64, syscw: u64) -> String {
    format!(
        "rchar: 1000\nwchar: 500\nsyscr: {syscr}\nsyscw: {syscw}\nread_bytes: 4096\nwrite_bytes: 2048\ncancelled_write_bytes: 0\n"
    )
}

impl MockFs {
    /// Creates a typical four-CPU system with a few processes.
    ///
    /// Includes: init (PID 1), a bash shell owned by uid 1000 and a zombie.
    pub fn typical_system() -> Self {
        let fs = Self::new();

        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
SwapTotal:       4096000 kB
SwapFree:        3072000 kB
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );
        fs.add_file(
            "/proc/cpuinfo",
            "\
processor\t: 0
physical id\t: 0
core id\t\t: 0

processor\t: 1
physical id\t: 0
core id\t\t: 1

processor\t: 2
physical id\t: 1
core id\t\t: 0

processor\t: 3
physical id\t: 1
core id\t\t: 1
",
        );
        fs.add_file(
            "/proc/vmstat",
            "\
nr_free_pages 2048000
pgpgin 123456
pgpgout 654321
pswpin 100
pswpout 200
",
        );
        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
  eth0: 9876543     5678    1    2    0     0          0        10 87654321     4321    3    4    0     5       0          0
  eth1:  555000      500    0    0    0     0          0         0   444000      400    0    0    0     0       0          0
 dummy0:      0        0    0    0    0     0          0         0        0        0    0    0    0     0       0          0
",
        );

        fs.add_process(
            1,
            &stat_line(1, "systemd", 'S', 500, 300, 1),
            "42000 2300 1500 300 0 3000 0\n",
            &io_content(9000, 4000),
            "/sbin/init\0splash\0",
        );
        fs.add_link("/proc/1/exe", "/usr/lib/systemd/systemd");
        fs.add_file("/proc/1/wchan", "ep_poll");

        fs.add_process(
            1234,
            &stat_line(1234, "bash", 'S', 10, 5, 12345),
            "5000 800 400 200 0 600 0\n",
            &io_content(100, 50),
            "/bin/bash\0--login\0",
        );
        fs.set_owner("/proc/1234/stat", 1000, 1000);
        fs.add_link("/proc/1234/exe", "/usr/bin/bash");
        fs.add_file("/proc/1234/wchan", "do_wait");

        fs.add_process(
            2000,
            &stat_line(2000, "worker", 'Z', 40, 20, 20000),
            "0 0 0 0 0 0 0\n",
            "",
            "",
        );
        fs.set_owner("/proc/2000/stat", 1000, 1000);

        fs
    }
}

/// Interface table matching [`MockFs::typical_system`]: `dummy0` is down,
/// every other interface is up and running.
pub fn typical_interfaces() -> MockInterfaceControl {
    let ifctl = MockInterfaceControl::new();
    ifctl.set(
        "lo",
        InterfaceAttributes {
            ip_address: Some(Ipv4Addr::new(127, 0, 0, 1)),
            netmask: Some(Ipv4Addr::new(255, 0, 0, 0)),
            broadcast: None,
            up: Some(true),
            running: Some(true),
        },
    );
    ifctl.set(
        "eth0",
        InterfaceAttributes {
            ip_address: Some(Ipv4Addr::new(192, 168, 1, 10)),
            netmask: Some(Ipv4Addr::new(255, 255, 255, 0)),
            broadcast: Some(Ipv4Addr::new(192, 168, 1, 255)),
            up: Some(true),
            running: Some(true),
        },
    );
    ifctl.set(
        "eth1",
        InterfaceAttributes {
            ip_address: Some(Ipv4Addr::new(10, 0, 0, 5)),
            netmask: Some(Ipv4Addr::new(255, 0, 0, 0)),
            broadcast: Some(Ipv4Addr::new(10, 255, 255, 255)),
            up: Some(true),
            running: Some(true),
        },
    );
    ifctl.set(
        "dummy0",
        InterfaceAttributes {
            up: Some(false),
            running: Some(false),
            ..Default::default()
        },
    );
    ifctl
}

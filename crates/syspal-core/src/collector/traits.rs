//! Abstractions over the OS facilities the PAL reads from.
//!
//! `FileSystem` covers the proc tree, `Sysconf` covers `sysconf(3)` and
//! `InterfaceControl` covers the interface `ioctl` requests. Each has a real
//! implementation and a mock in [`crate::collector::mock`], so the sampling
//! logic runs unchanged against fixtures.

use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Reads a file as raw bytes. Argument vectors are not always UTF-8.
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.read_to_string(path).map(String::into_bytes)
    }

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Resolves a symbolic link such as `/proc/[pid]/exe`.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Returns `(uid, gid)` of the file owner.
    fn owner(&self, path: &Path) -> io::Result<(u32, u32)>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }

    fn owner(&self, path: &Path) -> io::Result<(u32, u32)> {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::metadata(path)?;
        Ok((meta.uid(), meta.gid()))
    }
}

/// `sysconf(3)` keys the PAL consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SysconfKey {
    ProcessorsOnline,
    ClockTicks,
    PageSize,
}

/// Access to system configuration values.
pub trait Sysconf: Send + Sync {
    /// Returns the value, or `None` when the key is unavailable.
    fn get(&self, key: SysconfKey) -> Option<i64>;
}

/// `sysconf` through libc.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcSysconf;

impl Sysconf for LibcSysconf {
    fn get(&self, key: SysconfKey) -> Option<i64> {
        let name = match key {
            SysconfKey::ProcessorsOnline => libc::_SC_NPROCESSORS_ONLN,
            SysconfKey::ClockTicks => libc::_SC_CLK_TCK,
            SysconfKey::PageSize => libc::_SC_PAGESIZE,
        };
        // SAFETY: sysconf has no preconditions and only reads its argument.
        let value = unsafe { libc::sysconf(name) };
        (value >= 0).then_some(value as i64)
    }
}

/// Attributes filled in by the `ioctl` enrichment pass. `None` means the
/// request failed and the attribute is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceAttributes {
    pub ip_address: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
    pub broadcast: Option<Ipv4Addr>,
    pub up: Option<bool>,
    pub running: Option<bool>,
}

/// Per-interface address and flag queries.
pub trait InterfaceControl: Send + Sync {
    fn query(&self, name: &str) -> InterfaceAttributes;
}

/// Queries interfaces with `SIOCGIF*` requests on an `AF_INET` socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketInterfaceControl;

#[cfg(target_os = "linux")]
mod ifreq {
    use super::InterfaceAttributes;
    use std::net::Ipv4Addr;

    /// Layout-compatible with `struct ifreq`: the name followed by the
    /// 24-byte request union.
    #[repr(C)]
    struct IfReq {
        name: [libc::c_char; libc::IFNAMSIZ],
        data: [u8; 24],
    }

    impl IfReq {
        fn new(name: &str) -> Option<Self> {
            let bytes = name.as_bytes();
            if bytes.is_empty() || bytes.len() >= libc::IFNAMSIZ {
                return None;
            }
            let mut req = IfReq {
                name: [0; libc::IFNAMSIZ],
                data: [0; 24],
            };
            for (dst, src) in req.name.iter_mut().zip(bytes) {
                *dst = *src as libc::c_char;
            }
            Some(req)
        }

        fn address(&self) -> Option<Ipv4Addr> {
            // SAFETY: `data` is 24 bytes, larger than `sockaddr_in`; the read
            // is unaligned because `data` has byte alignment.
            let addr: libc::sockaddr_in =
                unsafe { std::ptr::read_unaligned(self.data.as_ptr().cast()) };
            if addr.sin_family as i32 != libc::AF_INET {
                return None;
            }
            Some(Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr)))
        }

        fn flags(&self) -> libc::c_short {
            libc::c_short::from_ne_bytes([self.data[0], self.data[1]])
        }
    }

    fn request(fd: libc::c_int, name: &str, code: libc::c_ulong) -> Option<IfReq> {
        let mut req = IfReq::new(name)?;
        // SAFETY: `req` is a valid, writable ifreq-sized buffer for the
        // duration of the call.
        let rc = unsafe { libc::ioctl(fd, code as _, &mut req as *mut IfReq) };
        (rc == 0).then_some(req)
    }

    pub(super) fn query(name: &str) -> InterfaceAttributes {
        // SAFETY: plain socket creation, checked below.
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
        if fd < 0 {
            tracing::debug!(interface = name, "socket for interface ioctl failed");
            return InterfaceAttributes::default();
        }
        let fd = scopeguard::guard(fd, |fd| {
            // SAFETY: `fd` was returned by socket() above and is closed once.
            unsafe { libc::close(fd) };
        });

        let flags = request(*fd, name, libc::SIOCGIFFLAGS as libc::c_ulong).map(|r| r.flags());
        InterfaceAttributes {
            ip_address: request(*fd, name, libc::SIOCGIFADDR as libc::c_ulong)
                .and_then(|r| r.address()),
            netmask: request(*fd, name, libc::SIOCGIFNETMASK as libc::c_ulong)
                .and_then(|r| r.address()),
            broadcast: request(*fd, name, libc::SIOCGIFBRDADDR as libc::c_ulong)
                .and_then(|r| r.address()),
            up: flags.map(|f| f as libc::c_int & libc::IFF_UP != 0),
            running: flags.map(|f| f as libc::c_int & libc::IFF_RUNNING != 0),
        }
    }
}

impl InterfaceControl for SocketInterfaceControl {
    #[cfg(target_os = "linux")]
    fn query(&self, name: &str) -> InterfaceAttributes {
        ifreq::query(name)
    }

    #[cfg(not(target_os = "linux"))]
    fn query(&self, _name: &str) -> InterfaceAttributes {
        InterfaceAttributes::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_real_fs_read_to_string() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "MemTotal: 16384 kB").unwrap();

        let fs = RealFs::new();
        let content = fs.read_to_string(file.path()).unwrap();
        assert!(content.starts_with("MemTotal:"));
        assert_eq!(fs.read_bytes(file.path()).unwrap(), content.into_bytes());
    }

    #[test]
    fn test_real_fs_exists() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs::new();
        assert!(fs.exists(dir.path()));
        assert!(!fs.exists(Path::new("/nonexistent/path/12345")));
    }

    #[test]
    fn test_real_fs_read_dir_and_owner() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stat"), "1 (init) S").unwrap();

        let fs = RealFs::new();
        let entries = fs.read_dir(dir.path()).unwrap();
        assert_eq!(entries, vec![dir.path().join("stat")]);

        // SAFETY: getuid never fails.
        let uid = unsafe { libc::getuid() };
        let (owner, _) = fs.owner(&dir.path().join("stat")).unwrap();
        assert_eq!(owner, uid);
    }

    #[test]
    fn test_real_fs_read_link() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::write(&target, "").unwrap();
        let link = dir.path().join("exe");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(RealFs::new().read_link(&link).unwrap(), target);
    }

    #[test]
    fn test_libc_sysconf() {
        let sc = LibcSysconf;
        assert!(sc.get(SysconfKey::ProcessorsOnline).unwrap() >= 1);
        assert!(sc.get(SysconfKey::ClockTicks).unwrap() > 0);
        assert!(sc.get(SysconfKey::PageSize).unwrap() >= 4096);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_socket_interface_control_unknown_interface() {
        let attrs = SocketInterfaceControl.query("nosuchif0");
        assert_eq!(attrs, InterfaceAttributes::default());
    }
}

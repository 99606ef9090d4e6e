//! In-memory mock filesystem for testing the PAL without a real `/proc`.
//!
//! Clones of a `MockFs` share state, so a test can hand one clone to the
//! dependency shim and keep mutating files through another between two
//! sampling passes.

use crate::collector::traits::FileSystem;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockFsState {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Symbolic links and their targets.
    links: HashMap<PathBuf, PathBuf>,
    /// File owners, `(0, 0)` when not set.
    owners: HashMap<PathBuf, (u32, u32)>,
    /// Paths that fail with `PermissionDenied`.
    denied: HashSet<PathBuf>,
}

impl MockFsState {
    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    state: Arc<RwLock<MockFsState>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file. Parent directories are created.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state.write();
        state.add_parents(&path);
        state.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state.write();
        state.add_parents(&path);
        state.directories.insert(path);
    }

    /// Adds a symbolic link.
    pub fn add_link(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state.write();
        state.add_parents(&path);
        state.links.insert(path, target.as_ref().to_path_buf());
    }

    /// Sets the owner reported for a path.
    pub fn set_owner(&self, path: impl AsRef<Path>, uid: u32, gid: u32) {
        self.state
            .write()
            .owners
            .insert(path.as_ref().to_path_buf(), (uid, gid));
    }

    /// Makes every read of `path` fail with `PermissionDenied`.
    pub fn deny(&self, path: impl AsRef<Path>) {
        self.state.write().denied.insert(path.as_ref().to_path_buf());
    }

    /// Lifts a previous [`MockFs::deny`].
    pub fn allow(&self, path: impl AsRef<Path>) {
        self.state.write().denied.remove(path.as_ref());
    }

    /// Removes a file, or a directory and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.state.write();
        state.files.retain(|p, _| !p.starts_with(path));
        state.directories.retain(|p| !p.starts_with(path));
        state.links.retain(|p, _| !p.starts_with(path));
        state.owners.retain(|p, _| !p.starts_with(path));
    }

    /// Adds a process with its typical `/proc/[pid]/` files.
    ///
    /// # Arguments
    /// * `pid` - Process ID
    /// * `stat` - Content of `/proc/[pid]/stat`
    /// * `statm` - Content of `/proc/[pid]/statm`
    /// * `io` - Content of `/proc/[pid]/io` (empty if not accessible)
    /// * `cmdline` - Content of `/proc/[pid]/cmdline`
    pub fn add_process(&self, pid: u32, stat: &str, statm: &str, io: &str, cmdline: &str) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_dir(&base);
        self.add_file(base.join("stat"), stat);
        self.add_file(base.join("statm"), statm);
        if !io.is_empty() {
            self.add_file(base.join("io"), io);
        }
        self.add_file(base.join("cmdline"), cmdline);
    }

    fn check_access(state: &MockFsState, path: &Path) -> io::Result<()> {
        if state.denied.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", path),
            ));
        }
        Ok(())
    }
}

fn not_found(what: &str, path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found: {:?}", what, path))
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let state = self.state.read();
        Self::check_access(&state, path)?;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found("file", path))
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.read();
        state.files.contains_key(path)
            || state.directories.contains(path)
            || state.links.contains_key(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let state = self.state.read();
        if !state.directories.contains(path) {
            return Err(not_found("directory", path));
        }

        let mut entries = HashSet::new();
        let children = state
            .files
            .keys()
            .chain(state.links.keys())
            .chain(state.directories.iter());
        for child in children {
            if child != path && child.parent().is_some_and(|parent| parent == path) {
                entries.insert(child.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        let state = self.state.read();
        Self::check_access(&state, path)?;
        state
            .links
            .get(path)
            .cloned()
            .ok_or_else(|| not_found("link", path))
    }

    fn owner(&self, path: &Path) -> io::Result<(u32, u32)> {
        let state = self.state.read();
        if !state.files.contains_key(path) && !state.directories.contains(path) {
            return Err(not_found("path", path));
        }
        Ok(state.owners.get(path).copied().unwrap_or((0, 0)))
    }
}

//! In-memory [`FileSystem`] for exercising collectors without a Linux host.
//!
//! Clones share the same underlying tree, so a test can keep one handle,
//! hand another to a `Sampler`, and change `/proc` between cycles.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Tree {
    files: HashMap<PathBuf, String>,
    directories: HashSet<PathBuf>,
    /// Paths that fail every read, to simulate unreadable sources.
    broken: HashSet<PathBuf>,
}

impl Tree {
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

/// Shared in-memory file tree.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    tree: Arc<RwLock<Tree>>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tree<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> R {
        let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
        f(&mut tree)
    }

    /// Adds or replaces a file; parent directories are created implicitly.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.with_tree(|tree| {
            tree.add_parents(&path);
            tree.broken.remove(&path);
            tree.files.insert(path, content.into());
        });
    }

    /// Adds an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.with_tree(|tree| {
            tree.add_parents(&path);
            tree.directories.insert(path);
        });
    }

    /// Removes a single file.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.with_tree(|tree| {
            tree.files.remove(path);
        });
    }

    /// Makes reads of `path` fail with `PermissionDenied` until it is re-added.
    pub fn break_path(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.with_tree(|tree| {
            tree.broken.insert(path);
        });
    }

    /// Adds `/proc/[pid]/stat` and `/proc/[pid]/status`.
    pub fn add_process(&self, pid: u32, stat: &str, status: &str) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_dir(&base);
        self.add_file(base.join("stat"), stat);
        self.add_file(base.join("status"), status);
    }

    /// Removes `/proc/[pid]` and everything below it, as if the process exited.
    pub fn remove_process(&self, pid: u32) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.with_tree(|tree| {
            tree.files.retain(|p, _| !p.starts_with(&base));
            tree.directories.retain(|p| !p.starts_with(&base));
        });
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        if tree.broken.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("unreadable: {:?}", path),
            ));
        }
        tree.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        tree.files.contains_key(path) || tree.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        if tree.broken.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("unreadable: {:?}", path),
            ));
        }
        if !tree.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let children: HashSet<PathBuf> = tree
            .files
            .keys()
            .chain(tree.directories.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();

        Ok(children.into_iter().collect())
    }
}

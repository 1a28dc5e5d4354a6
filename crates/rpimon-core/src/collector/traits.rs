//! The text data source every collector reads from.
//!
//! Kernel pseudo-files are re-read in full each cycle, so the trait only
//! exposes whole-file reads and directory listings.

use std::io;
use std::path::{Path, PathBuf};

/// Pull-based access to `/proc`, `/sys` and `/etc` text files.
///
/// Implementations must be shareable across threads because the sampler
/// and its sub-collectors each hold a clone.
pub trait FileSystem: Send + Sync {
    /// Reads a whole file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Returns `true` if the path names a file or a directory.
    fn exists(&self, path: &Path) -> bool;

    /// Lists the direct children of a directory as full paths.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`FileSystem`] backed by `std::fs`, used on the target host.
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

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }
}

//! Text artifacts for local consumers.
//!
//! Each cycle rewrites `ram`, `cpu` and `proc` (and `ext_temp` when an
//! external thermometer is configured) in the output directory. Every file is
//! written to `<name>.tmp`, synced, then renamed over `<name>`, so a reader
//! sees either the previous cycle or the new one, never a partial file.

mod render;

pub use render::{CpuText, ExtTempText, ProcText, RamText};

use crate::model::CycleReport;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const RAM_FILE: &str = "ram";
pub const CPU_FILE: &str = "cpu";
pub const PROC_FILE: &str = "proc";
pub const EXT_TEMP_FILE: &str = "ext_temp";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes `contents` to `path` through a `.tmp` sibling and an atomic rename.
///
/// On failure the `.tmp` sibling is removed and `path` is left untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let result = fs::File::create(&tmp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)
    });

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Renders cycle reports into the output directory.
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    dir: PathBuf,
}

impl SnapshotPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the output directory if needed.
    pub fn prepare(&self) -> Result<(), PublishError> {
        fs::create_dir_all(&self.dir).map_err(|source| PublishError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    fn write(&self, name: &str, contents: String) -> Result<(), PublishError> {
        let path = self.dir.join(name);
        write_atomic(&path, contents.as_bytes()).map_err(|source| PublishError::Io { path, source })
    }

    /// Writes every artifact of `report`.
    ///
    /// `ext_temp` is only rewritten when the report carries a reading, so a
    /// failed sensor read leaves the last good value in place.
    pub fn publish(&self, report: &CycleReport) -> Result<(), PublishError> {
        self.write(RAM_FILE, RamText(&report.ram).to_string())?;
        self.write(CPU_FILE, CpuText(&report.cpu).to_string())?;
        self.write(PROC_FILE, ProcText(&report.processes).to_string())?;
        if let Some(celsius) = report.external_temp {
            self.write(EXT_TEMP_FILE, ExtTempText(celsius).to_string())?;
        }
        debug!(cycle = report.cycle, dir = %self.dir.display(), "artifacts published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CpuDelta, ProcessRecord, RamSnapshot};
    use chrono::Utc;

    fn report(external_temp: Option<f64>) -> CycleReport {
        CycleReport {
            cycle: 3,
            timestamp: Utc::now(),
            cpu: CpuDelta::default(),
            processes: vec![ProcessRecord {
                pid: 1000,
                name: "bash".into(),
                ..Default::default()
            }],
            ram: RamSnapshot {
                total_kb: 1000,
                free_kb: 400,
                available_kb: 600,
            },
            external_temp,
        }
    }

    #[test]
    fn test_write_atomic_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ram");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("ram.tmp").exists());
    }

    #[test]
    fn test_write_atomic_failed_rename_removes_tmp() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory cannot be replaced by a file
        let path = dir.path().join("ram");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        assert!(write_atomic(&path, b"data").is_err());
        assert!(!dir.path().join("ram.tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_publish_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SnapshotPublisher::new(dir.path());
        publisher.publish(&report(None)).unwrap();

        let ram = fs::read_to_string(dir.path().join(RAM_FILE)).unwrap();
        assert!(ram.starts_with("Ram total: 1000 kB\n"));
        let procs = fs::read_to_string(dir.path().join(PROC_FILE)).unwrap();
        assert!(procs.starts_with("Proc: 1000 bash\n"));
        assert!(dir.path().join(CPU_FILE).exists());
        assert!(!dir.path().join(EXT_TEMP_FILE).exists());

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_publish_external_temp_keeps_last_good() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SnapshotPublisher::new(dir.path());

        publisher.publish(&report(Some(21.5))).unwrap();
        publisher.publish(&report(None)).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(EXT_TEMP_FILE)).unwrap(),
            "Temp: 21.500000\n"
        );
    }

    #[test]
    fn test_prepare_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        let publisher = SnapshotPublisher::new(&out);
        publisher.prepare().unwrap();
        publisher.publish(&report(None)).unwrap();
        assert!(out.join(RAM_FILE).exists());
    }

    #[test]
    fn test_publish_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SnapshotPublisher::new(dir.path().join("absent"));
        assert!(matches!(
            publisher.publish(&report(None)),
            Err(PublishError::Io { .. })
        ));
    }
}

//! Process collector for gathering per-process records from `/proc/[pid]/`.

use crate::collector::procfs::parser::{
    GroupResolver, ParseError, UserResolver, parse_proc_stat, parse_proc_status,
};
use crate::collector::traits::FileSystem;
use crate::model::ProcessRecord;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for collection failures.
///
/// `ProcessGone`, `Privileged` and `Parse` are per-record: the record is
/// dropped and the cycle goes on. `Io` and `Acquisition` on a system-wide
/// source abort the whole cycle.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Process disappeared during collection.
    #[error("process {0} disappeared")]
    ProcessGone(u32),
    /// Process runs as root and is never reported.
    #[error("process {0} runs as root")]
    Privileged(u32),
    /// A source file or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A source was readable but did not contain what the cycle needs.
    #[error("acquisition failed: {what}")]
    Acquisition { what: String },
    /// Parse error in a per-process file.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl CollectError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        CollectError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Collects non-root process records from `/proc/[pid]/` files.
pub struct ProcessCollector<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    users: UserResolver,
    groups: GroupResolver,
}

impl<F: FileSystem> ProcessCollector<F> {
    /// Creates a new process collector with empty name resolvers.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            users: UserResolver::new(),
            groups: GroupResolver::new(),
        }
    }

    /// Loads `passwd` and `group` from `etc_path`.
    ///
    /// Missing files are not fatal: ids then render as numbers.
    pub fn load_identities(&mut self, etc_path: &Path) {
        let passwd = etc_path.join("passwd");
        match self.fs.read_to_string(&passwd) {
            Ok(content) => self.users.load_from_content(&content),
            Err(e) => warn!(path = %passwd.display(), error = %e, "user names unavailable"),
        }

        let group = etc_path.join("group");
        match self.fs.read_to_string(&group) {
            Ok(content) => self.groups.load_from_content(&content),
            Err(e) => warn!(path = %group.display(), error = %e, "group names unavailable"),
        }
    }

    /// Collects a single process.
    ///
    /// The returned record has `prev_ticks == ticks`; the sampler fills in the
    /// baseline.
    pub fn collect_process(&self, pid: u32) -> Result<ProcessRecord, CollectError> {
        let proc_dir = self.proc_path.join(pid.to_string());

        let status_content = self
            .fs
            .read_to_string(&proc_dir.join("status"))
            .map_err(|_| CollectError::ProcessGone(pid))?;
        let status = parse_proc_status(&status_content)?;

        if status.uid == 0 {
            return Err(CollectError::Privileged(pid));
        }

        let stat_content = self
            .fs
            .read_to_string(&proc_dir.join("stat"))
            .map_err(|_| CollectError::ProcessGone(pid))?;
        let stat = parse_proc_stat(&stat_content)?;

        let ticks = stat.utime.saturating_add(stat.stime);

        Ok(ProcessRecord {
            pid,
            name: status.name,
            state: status.state,
            uid: status.uid,
            user: self.users.resolve(status.uid),
            gid: status.gid,
            group: self.groups.resolve(status.gid),
            vm_peak_kb: status.vm_peak,
            vm_size_kb: status.vm_size,
            vm_swap_kb: status.vm_swap,
            threads: status.threads,
            cpus_allowed: status.cpus_allowed,
            ticks,
            prev_ticks: ticks,
        })
    }

    /// Collects every non-root process, sorted by pid.
    ///
    /// Processes that disappear or run as root are skipped silently; records
    /// that fail to parse are dropped with a debug log. Only an unreadable
    /// `/proc` directory is an error.
    pub fn collect_all_processes(&self) -> Result<Vec<ProcessRecord>, CollectError> {
        let entries = self
            .fs
            .read_dir(&self.proc_path)
            .map_err(|e| CollectError::io(&self.proc_path, e))?;

        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|entry| entry.file_name().and_then(|n| n.to_str()))
            .filter_map(|name| name.parse::<u32>().ok())
            .collect();
        pids.sort_unstable();

        let mut processes = Vec::with_capacity(pids.len());
        for pid in pids {
            match self.collect_process(pid) {
                Ok(record) => processes.push(record),
                Err(CollectError::ProcessGone(_)) | Err(CollectError::Privileged(_)) => continue,
                Err(e) => debug!(pid, error = %e, "dropping process record"),
            }
        }

        Ok(processes)
    }
}

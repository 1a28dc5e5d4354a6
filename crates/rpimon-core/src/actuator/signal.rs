//! Process termination through `kill(2)`.

use std::fmt;
use std::io;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Signal used to terminate processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationSignal {
    /// `SIGABRT`, leaves a core dump where enabled.
    #[default]
    Abort,
    /// `SIGTERM`
    Terminate,
    /// `SIGKILL`
    Kill,
}

impl TerminationSignal {
    pub fn as_raw(self) -> libc::c_int {
        match self {
            TerminationSignal::Abort => libc::SIGABRT,
            TerminationSignal::Terminate => libc::SIGTERM,
            TerminationSignal::Kill => libc::SIGKILL,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TerminationSignal::Abort => "SIGABRT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Kill => "SIGKILL",
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TerminationSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.strip_prefix("sig").unwrap_or(&lower) {
            "abrt" | "abort" => Ok(TerminationSignal::Abort),
            "term" => Ok(TerminationSignal::Terminate),
            "kill" => Ok(TerminationSignal::Kill),
            _ => Err(format!("unknown signal {:?}, expected abrt, term or kill", s)),
        }
    }
}

/// Why a termination request failed.
#[derive(Debug, Error)]
pub enum TerminateError {
    /// The agent lacks the privilege to signal this process.
    #[error("permission denied signalling pid {pid} (run the agent as root)")]
    PermissionDenied { pid: u32 },
    #[error("no such process {pid}")]
    NoSuchProcess { pid: u32 },
    /// Pid 0 and pids beyond `i32::MAX` would address process groups.
    #[error("invalid pid {0}")]
    InvalidPid(u32),
    #[error("failed to signal pid {pid}: {source}")]
    Os {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// Delivers a termination signal to a process.
pub trait ProcessSignaller: Send + Sync {
    fn signal_terminate(&self, pid: u32) -> Result<(), TerminateError>;
}

/// [`ProcessSignaller`] backed by `libc::kill`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KillSignaller {
    signal: TerminationSignal,
}

impl KillSignaller {
    pub fn new(signal: TerminationSignal) -> Self {
        Self { signal }
    }
}

impl ProcessSignaller for KillSignaller {
    fn signal_terminate(&self, pid: u32) -> Result<(), TerminateError> {
        if pid == 0 || pid > i32::MAX as u32 {
            return Err(TerminateError::InvalidPid(pid));
        }

        // SAFETY: kill has no memory-safety preconditions; pid > 0 addresses a
        // single process
        let rc = unsafe { libc::kill(pid as libc::pid_t, self.signal.as_raw()) };
        if rc == 0 {
            debug!(pid, signal = %self.signal, "signal delivered");
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EPERM) => Err(TerminateError::PermissionDenied { pid }),
            Some(libc::ESRCH) => Err(TerminateError::NoSuchProcess { pid }),
            _ => Err(TerminateError::Os { pid, source: err }),
        }
    }
}

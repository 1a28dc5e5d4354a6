//! Validates decoded commands and runs them against the actuators.

use crate::actuator::{LineDriver, ProcessSignaller, TerminateError};
use crate::config::LineSet;
use crate::protocol::{Command, Status, ValidationError};
use crate::shared::SnapshotCell;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared by every session; cheap to call from many threads.
pub struct Dispatcher {
    lines: Arc<dyn LineDriver>,
    line_set: LineSet,
    signaller: Arc<dyn ProcessSignaller>,
    snapshots: SnapshotCell,
}

impl Dispatcher {
    pub fn new(
        lines: Arc<dyn LineDriver>,
        line_set: LineSet,
        signaller: Arc<dyn ProcessSignaller>,
        snapshots: SnapshotCell,
    ) -> Self {
        Self {
            lines,
            line_set,
            signaller,
            snapshots,
        }
    }

    /// Checks arguments without touching any actuator.
    pub fn validate(&self, command: &Command) -> Result<(), ValidationError> {
        match *command {
            Command::TerminateProcess { pid } => {
                if pid == 0 || pid > i32::MAX as u32 {
                    return Err(ValidationError::InvalidPid(pid));
                }
            }
            Command::SetDigitalLine { line, value } => {
                if !self.line_set.contains(line) {
                    return Err(ValidationError::LineUnavailable(line));
                }
                if value > 1 {
                    return Err(ValidationError::InvalidLineValue(value));
                }
            }
        }
        Ok(())
    }

    /// Runs one command and maps the result to its status byte.
    pub fn execute(&self, command: Command) -> Status {
        if let Err(e) = self.validate(&command) {
            warn!(%command, error = %e, "rejected command");
            return e.into();
        }

        match command {
            Command::TerminateProcess { pid } => self.terminate(pid),
            Command::SetDigitalLine { line, value } => self.set_line(line, value == 1),
        }
    }

    fn terminate(&self, pid: u32) -> Status {
        let name = self.snapshots.process_name(pid);
        info!(
            pid,
            name = name.as_deref().unwrap_or("?"),
            "terminating process on remote request"
        );

        match self.signaller.signal_terminate(pid) {
            Ok(()) => Status::Ok,
            Err(TerminateError::PermissionDenied { .. }) => {
                warn!(pid, "not permitted to terminate process; run rpimond as root");
                Status::PermissionDenied
            }
            Err(TerminateError::NoSuchProcess { .. }) => Status::NoSuchProcess,
            Err(TerminateError::InvalidPid(_)) => Status::InvalidArgument,
            Err(e) => {
                warn!(pid, error = %e, "termination failed");
                Status::Failure
            }
        }
    }

    fn set_line(&self, line: u8, value: bool) -> Status {
        match self.lines.set_line(line, value) {
            Ok(()) => {
                info!(line, value, "line set");
                Status::Ok
            }
            Err(e) => {
                warn!(line, error = %e, "line driver failed");
                Status::Failure
            }
        }
    }
}

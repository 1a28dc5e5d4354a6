//! Recording doubles for the termination and temperature capabilities.

use super::signal::{ProcessSignaller, TerminateError};
use super::thermo::{ThermoError, Thermometer};
use std::collections::HashSet;
use std::sync::Mutex;

/// Records every pid it is asked to terminate.
///
/// Pids can be marked as protected (`PermissionDenied`) or missing
/// (`NoSuchProcess`); everything else succeeds.
#[derive(Debug, Default)]
pub struct RecordingSignaller {
    inner: Mutex<Recording>,
}

#[derive(Debug, Default)]
struct Recording {
    signalled: Vec<u32>,
    denied: HashSet<u32>,
    missing: HashSet<u32>,
}

impl RecordingSignaller {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Recording) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut inner)
    }

    pub fn deny(&self, pid: u32) {
        self.with(|r| {
            r.denied.insert(pid);
        });
    }

    pub fn mark_missing(&self, pid: u32) {
        self.with(|r| {
            r.missing.insert(pid);
        });
    }

    /// Pids successfully signalled, in order.
    pub fn signalled(&self) -> Vec<u32> {
        self.with(|r| r.signalled.clone())
    }
}

impl ProcessSignaller for RecordingSignaller {
    fn signal_terminate(&self, pid: u32) -> Result<(), TerminateError> {
        self.with(|r| {
            if pid == 0 {
                Err(TerminateError::InvalidPid(pid))
            } else if r.denied.contains(&pid) {
                Err(TerminateError::PermissionDenied { pid })
            } else if r.missing.contains(&pid) {
                Err(TerminateError::NoSuchProcess { pid })
            } else {
                r.signalled.push(pid);
                Ok(())
            }
        })
    }
}

/// Thermometer that always reports the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedThermometer {
    celsius: f64,
}

impl FixedThermometer {
    pub fn new(celsius: f64) -> Self {
        Self { celsius }
    }
}

impl Thermometer for FixedThermometer {
    fn read_temperature(&self) -> Result<f64, ThermoError> {
        Ok(self.celsius)
    }
}

//! Digital output lines.

use crate::config::LineSet;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LineError {
    #[error("line {line}: {source}")]
    Io {
        line: u8,
        #[source]
        source: io::Error,
    },
    #[error("line {0} is not driven")]
    Unavailable(u8),
}

/// Drives a single digital output line high or low.
pub trait LineDriver: Send + Sync {
    fn set_line(&self, line: u8, value: bool) -> Result<(), LineError>;
}

/// Lines exported through the sysfs GPIO interface (`/sys/class/gpio`).
///
/// Line numbers are offsets on the chip; sysfs names pins by global number,
/// `base + line`. Raspberry Pi 6.x kernels put gpiochip0 at base 512 (see
/// `/sys/class/gpio/gpiochip*/base`).
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
    base: u32,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base: 0,
        }
    }

    /// Sets the global number of the chip's first line.
    pub fn with_base(mut self, base: u32) -> Self {
        self.base = base;
        self
    }

    fn global(&self, line: u8) -> u32 {
        self.base + line as u32
    }

    fn line_dir(&self, line: u8) -> PathBuf {
        self.root.join(format!("gpio{}", self.global(line)))
    }

    /// Exports every line of `lines` and configures it as a low output.
    ///
    /// Lines that fail are logged and skipped; later writes to them report
    /// a driver failure.
    pub fn prepare(&self, lines: &LineSet) -> usize {
        let mut ready = 0;
        for line in lines.iter() {
            match self.prepare_line(line) {
                Ok(()) => ready += 1,
                Err(e) => warn!(line, error = %e, "cannot configure line as output"),
            }
        }
        debug!(ready, requested = lines.len(), "gpio lines prepared");
        ready
    }

    fn prepare_line(&self, line: u8) -> io::Result<()> {
        let dir = self.line_dir(line);
        if !dir.exists() {
            fs::write(self.root.join("export"), self.global(line).to_string())?;
        }
        // "low" sets direction and initial value in one write
        fs::write(dir.join("direction"), "low")
    }
}

impl LineDriver for SysfsGpio {
    fn set_line(&self, line: u8, value: bool) -> Result<(), LineError> {
        let path = self.line_dir(line).join("value");
        fs::write(&path, if value { "1" } else { "0" })
            .map_err(|source| LineError::Io { line, source })
    }
}

/// In-memory line driver used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryLines {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    levels: HashMap<u8, bool>,
    writes: Vec<(u8, bool)>,
    failing: HashSet<u8>,
}

impl MemoryLines {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Makes every write to `line` fail.
    pub fn fail_line(&self, line: u8) {
        self.with_state(|s| {
            s.failing.insert(line);
        });
    }

    /// Current level of `line`, `None` if never written.
    pub fn level(&self, line: u8) -> Option<bool> {
        self.with_state(|s| s.levels.get(&line).copied())
    }

    /// Every successful write in order.
    pub fn writes(&self) -> Vec<(u8, bool)> {
        self.with_state(|s| s.writes.clone())
    }
}

impl LineDriver for MemoryLines {
    fn set_line(&self, line: u8, value: bool) -> Result<(), LineError> {
        self.with_state(|s| {
            if s.failing.contains(&line) {
                return Err(LineError::Unavailable(line));
            }
            s.levels.insert(line, value);
            s.writes.push((line, value));
            debug!(line, value, "line set (dry run)");
            Ok(())
        })
    }
}

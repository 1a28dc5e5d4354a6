//! System collector for CPU counters, memory totals and SoC temperature.

use crate::collector::procfs::parser::{parse_cpu_lines, parse_meminfo, parse_thermal};
use crate::collector::procfs::process::CollectError;
use crate::collector::traits::FileSystem;
use crate::model::{CpuSnapshot, RamSnapshot};
use std::path::PathBuf;
use tracing::debug;

/// Thermal zone of the SoC, relative to the sysfs root.
const SOC_THERMAL_ZONE: &str = "class/thermal/thermal_zone0/temp";

/// Collects system-wide metrics from `/proc/` and `/sys/`.
pub struct SystemCollector<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    sys_path: PathBuf,
    core_count: usize,
}

impl<F: FileSystem> SystemCollector<F> {
    /// Creates a new system collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    /// * `sys_path` - Base path to sysfs (usually "/sys")
    /// * `core_count` - Number of `cpuN` lines every cycle must provide
    pub fn new(
        fs: F,
        proc_path: impl Into<PathBuf>,
        sys_path: impl Into<PathBuf>,
        core_count: usize,
    ) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            sys_path: sys_path.into(),
            core_count,
        }
    }

    pub fn core_count(&self) -> usize {
        self.core_count
    }

    /// Reads the aggregate and per-core counters from `/proc/stat`, plus the
    /// SoC temperature.
    pub fn collect_cpu(&self) -> Result<CpuSnapshot, CollectError> {
        let path = self.proc_path.join("stat");
        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|e| CollectError::io(&path, e))?;
        let lines = parse_cpu_lines(&content, self.core_count).map_err(|e| {
            CollectError::Acquisition {
                what: format!("{}: {}", path.display(), e.message),
            }
        })?;

        Ok(CpuSnapshot {
            aggregate: lines.aggregate,
            cores: lines.cores,
            temperature_mc: self.collect_soc_temperature(),
        })
    }

    /// Reads memory totals from `/proc/meminfo`.
    pub fn collect_ram(&self) -> Result<RamSnapshot, CollectError> {
        let path = self.proc_path.join("meminfo");
        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|e| CollectError::io(&path, e))?;
        let info = parse_meminfo(&content).map_err(|e| CollectError::Acquisition {
            what: format!("{}: {}", path.display(), e.message),
        })?;

        Ok(RamSnapshot {
            total_kb: info.mem_total,
            free_kb: info.mem_free,
            available_kb: info.mem_available,
        })
    }

    /// SoC temperature in millidegrees Celsius, `None` if unreadable.
    pub fn collect_soc_temperature(&self) -> Option<i64> {
        let path = self.sys_path.join(SOC_THERMAL_ZONE);
        let reading = self
            .fs
            .read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| parse_thermal(&content).map_err(|e| e.message));
        match reading {
            Ok(mc) => Some(mc),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "SoC temperature unavailable");
                None
            }
        }
    }
}

/// Number of configured logical processors, at least 1.
pub fn logical_processors() -> usize {
    // SAFETY: sysconf has no preconditions
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
    if n < 1 { 1 } else { n as usize }
}

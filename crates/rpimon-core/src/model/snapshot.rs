//! The immutable unit published once per sampling cycle.

use super::cpu::CpuDelta;
use super::process::ProcessRecord;
use chrono::{DateTime, Utc};

/// Memory totals from `/proc/meminfo`, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RamSnapshot {
    pub total_kb: u64,
    pub free_kb: u64,
    pub available_kb: u64,
}

/// Everything one sampling cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// 1-based cycle number since the sampler started.
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuDelta,
    /// Non-root processes ordered by pid.
    pub processes: Vec<ProcessRecord>,
    pub ram: RamSnapshot,
    /// External thermometer reading in degrees Celsius, if one is configured
    /// and the read succeeded.
    pub external_temp: Option<f64>,
}

impl CycleReport {
    /// Looks up a process by pid.
    pub fn process(&self, pid: u32) -> Option<&ProcessRecord> {
        self.processes
            .binary_search_by_key(&pid, |p| p.pid)
            .ok()
            .map(|i| &self.processes[i])
    }
}

//! Per-process record built from `/proc/[pid]/status` and `/proc/[pid]/stat`.

use crate::rates::counter_delta;

/// One non-root process as seen in a single sampling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessRecord {
    /// Source: `/proc/[pid]` directory name
    pub pid: u32,

    /// Source: `/proc/[pid]/status` Name
    pub name: String,

    /// Full state text, e.g. `S (sleeping)`.
    /// Source: `/proc/[pid]/status` State
    pub state: String,

    /// Real UID. Never 0 in a published record.
    /// Source: `/proc/[pid]/status` Uid (first column)
    pub uid: u32,
    pub user: String,

    /// Real GID.
    /// Source: `/proc/[pid]/status` Gid (first column)
    pub gid: u32,
    pub group: String,

    /// Source: `/proc/[pid]/status` VmPeak (kB)
    pub vm_peak_kb: u64,
    /// Source: `/proc/[pid]/status` VmSize (kB)
    pub vm_size_kb: u64,
    /// Source: `/proc/[pid]/status` VmSwap (kB)
    pub vm_swap_kb: u64,

    /// Source: `/proc/[pid]/status` Threads
    pub threads: u32,

    /// Allowed-CPU bitmask.
    /// Source: `/proc/[pid]/status` Cpus_allowed
    pub cpus_allowed: u64,

    /// Cumulative utime + stime at this cycle.
    /// Source: `/proc/[pid]/stat` fields 14 and 15
    pub ticks: u64,

    /// Cumulative utime + stime at the previous cycle, or `ticks` if the pid
    /// is new.
    pub prev_ticks: u64,
}

impl ProcessRecord {
    /// CPU ticks consumed during the last interval.
    pub fn delta(&self) -> u64 {
        counter_delta(self.ticks, self.prev_ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta() {
        let rec = ProcessRecord {
            ticks: 500,
            prev_ticks: 320,
            ..Default::default()
        };
        assert_eq!(rec.delta(), 180);
    }

    #[test]
    fn test_delta_saturates() {
        // pid reuse can make the new process start below the old baseline
        let rec = ProcessRecord {
            ticks: 10,
            prev_ticks: 320,
            ..Default::default()
        };
        assert_eq!(rec.delta(), 0);
    }
}

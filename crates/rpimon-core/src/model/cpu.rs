//! CPU tick counters and their per-cycle deltas.

use crate::rates::counter_delta;

/// Seven cumulative tick counters of one `/proc/stat` cpu line.
///
/// Source: `/proc/stat`, `cpu` (aggregate) or `cpuN` (one core) lines.
/// Counters are in USER_HZ ticks and only move forward, except across a
/// counter reset or wraparound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreCounters {
    /// Time in user mode.
    /// Source: column 1
    pub user: u64,

    /// Time in user mode with positive nice.
    /// Source: column 2
    pub user_nice: u64,

    /// Time in kernel mode.
    /// Source: column 3
    pub kernel: u64,

    /// Idle time.
    /// Source: column 4
    pub idle: u64,

    /// Time waiting for I/O.
    /// Source: column 5
    pub iowait: u64,

    /// Time servicing hardware interrupts.
    /// Source: column 6
    pub irq: u64,

    /// Time servicing softirqs.
    /// Source: column 7
    pub soft_irq: u64,
}

impl CoreCounters {
    /// Sum of all seven counters.
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.user_nice)
            .saturating_add(self.kernel)
            .saturating_add(self.idle)
            .saturating_add(self.iowait)
            .saturating_add(self.irq)
            .saturating_add(self.soft_irq)
    }

    /// Ticks accumulated since `prev`.
    ///
    /// If the total went backwards the counters were reset and the whole delta
    /// is zero. Otherwise each field saturates at zero on its own.
    pub fn delta_since(&self, prev: &CoreCounters) -> CoreCounters {
        if self.total() < prev.total() {
            return CoreCounters::default();
        }
        CoreCounters {
            user: counter_delta(self.user, prev.user),
            user_nice: counter_delta(self.user_nice, prev.user_nice),
            kernel: counter_delta(self.kernel, prev.kernel),
            idle: counter_delta(self.idle, prev.idle),
            iowait: counter_delta(self.iowait, prev.iowait),
            irq: counter_delta(self.irq, prev.irq),
            soft_irq: counter_delta(self.soft_irq, prev.soft_irq),
        }
    }
}

/// Raw counters for the aggregate line and every core, plus SoC temperature.
///
/// The sampler keeps the previous and the current instance; everything else
/// only ever sees a [`CpuDelta`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub aggregate: CoreCounters,
    pub cores: Vec<CoreCounters>,
    /// Millidegrees Celsius, `None` when the thermal zone cannot be read.
    pub temperature_mc: Option<i64>,
}

impl CpuSnapshot {
    /// Deltas against `prev`, core by core.
    ///
    /// Cores missing from `prev` get a zero delta.
    pub fn delta_since(&self, prev: &CpuSnapshot) -> CpuDelta {
        let cores = self
            .cores
            .iter()
            .enumerate()
            .map(|(i, cur)| match prev.cores.get(i) {
                Some(p) => cur.delta_since(p),
                None => CoreCounters::default(),
            })
            .collect();

        CpuDelta {
            aggregate: self.aggregate.delta_since(&prev.aggregate),
            cores,
            temperature_mc: self.temperature_mc,
        }
    }
}

/// Ticks spent in each state during one sampling interval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuDelta {
    pub aggregate: CoreCounters,
    pub cores: Vec<CoreCounters>,
    /// Temperature at the end of the interval, millidegrees Celsius.
    pub temperature_mc: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(user: u64, idle: u64) -> CoreCounters {
        CoreCounters {
            user,
            idle,
            ..Default::default()
        }
    }

    #[test]
    fn test_total() {
        let c = CoreCounters {
            user: 1,
            user_nice: 2,
            kernel: 3,
            idle: 4,
            iowait: 5,
            irq: 6,
            soft_irq: 7,
        };
        assert_eq!(c.total(), 28);
    }

    #[test]
    fn test_delta_since_monotonic() {
        let prev = counters(100, 1000);
        let cur = counters(150, 1200);
        let d = cur.delta_since(&prev);
        assert_eq!(d.user, 50);
        assert_eq!(d.idle, 200);
        assert_eq!(d.total(), 250);
    }

    #[test]
    fn test_delta_since_reset_is_zero() {
        let prev = counters(100, 1000);
        let cur = counters(5, 10);
        assert_eq!(cur.delta_since(&prev), CoreCounters::default());
    }

    #[test]
    fn test_delta_since_field_never_negative() {
        // total grows but one field moved backwards
        let prev = counters(100, 1000);
        let cur = counters(90, 2000);
        let d = cur.delta_since(&prev);
        assert_eq!(d.user, 0);
        assert_eq!(d.idle, 1000);
    }

    #[test]
    fn test_snapshot_delta_handles_core_mismatch() {
        let prev = CpuSnapshot {
            aggregate: counters(10, 10),
            cores: vec![counters(5, 5)],
            temperature_mc: None,
        };
        let cur = CpuSnapshot {
            aggregate: counters(30, 30),
            cores: vec![counters(15, 5), counters(7, 7)],
            temperature_mc: Some(47_000),
        };
        let d = cur.delta_since(&prev);
        assert_eq!(d.aggregate.total(), 40);
        assert_eq!(d.cores[0].user, 10);
        assert_eq!(d.cores[1], CoreCounters::default());
        assert_eq!(d.temperature_mc, Some(47_000));
    }
}

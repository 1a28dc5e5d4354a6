//! Per-process tick deltas across sampling cycles.
//!
//! The sampler owns one [`TickBaseline`]. Each cycle it looks up every pid it
//! sees, and after a successful cycle the baseline is replaced by exactly the
//! pids of that cycle, so exited processes drop out on their own.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Delta helpers
// ---------------------------------------------------------------------------

/// Compute u64 delta, returning `None` on counter regression.
pub fn du64(curr: u64, prev: u64) -> Option<u64> {
    (curr >= prev).then_some(curr - prev)
}

/// Delta of a cumulative counter, with regression clamped to zero.
pub fn counter_delta(curr: u64, prev: u64) -> u64 {
    du64(curr, prev).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Baseline
// ---------------------------------------------------------------------------

/// Cumulative ticks of every pid seen in the last successful cycle.
#[derive(Debug, Default, Clone)]
pub struct TickBaseline {
    ticks: HashMap<u32, u64>,
}

impl TickBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Previous cumulative ticks for `pid`.
    ///
    /// A pid that was not seen last cycle gets `current` back, so its first
    /// delta is zero.
    pub fn previous(&self, pid: u32, current: u64) -> u64 {
        self.ticks.get(&pid).copied().unwrap_or(current)
    }

    /// Replaces the whole baseline with this cycle's `(pid, ticks)` pairs.
    pub fn replace_with(&mut self, entries: impl IntoIterator<Item = (u32, u64)>) {
        self.ticks.clear();
        self.ticks.extend(entries);
        self.ticks.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

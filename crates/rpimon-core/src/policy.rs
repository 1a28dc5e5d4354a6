//! CPU-share eviction policy.
//!
//! A process whose tick delta in one cycle reaches `percent` of the aggregate
//! tick delta (all cores, all states including idle) is terminated. There is
//! no grace period: an offender that survives is signalled again next cycle.

use crate::actuator::{ProcessSignaller, TerminateError};
use crate::config::{ConfigError, MAX_THRESHOLD_PERCENT};
use crate::model::CycleReport;
use tracing::{debug, info, warn};

/// `floor(percent * total / 100)` without intermediate overflow.
pub fn threshold_for(percent: u32, total: u64) -> u64 {
    (percent as u128 * total as u128 / 100) as u64
}

/// What one evaluation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    /// Tick threshold used for this cycle.
    pub threshold: u64,
    /// Pids the signal was delivered to.
    pub signalled: Vec<u32>,
    /// Pids the agent was not allowed to signal.
    pub denied: Vec<u32>,
    /// Pids that exited before the signal.
    pub vanished: Vec<u32>,
    /// Pids that failed for any other reason.
    pub failed: Vec<u32>,
}

impl EvictionOutcome {
    pub fn candidates(&self) -> usize {
        self.signalled.len() + self.denied.len() + self.vanished.len() + self.failed.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    percent: u8,
}

impl EvictionPolicy {
    pub fn new(percent: u8) -> Result<Self, ConfigError> {
        if percent > MAX_THRESHOLD_PERCENT {
            return Err(ConfigError::ThresholdOutOfRange(percent as u32));
        }
        Ok(Self { percent })
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Signals every process at or above the threshold.
    ///
    /// Zero-delta processes are never candidates, so `percent == 0` only hits
    /// processes that actually ran. A cycle with no aggregate ticks signals
    /// nothing.
    pub fn evaluate(
        &self,
        report: &CycleReport,
        signaller: &dyn ProcessSignaller,
    ) -> EvictionOutcome {
        let total = report.cpu.aggregate.total();
        if total == 0 {
            // counters reset or no baseline: no share can be computed
            debug!(cycle = report.cycle, "no aggregate CPU ticks this cycle, eviction skipped");
            return EvictionOutcome::default();
        }
        let threshold = threshold_for(self.percent as u32, total);
        let mut outcome = EvictionOutcome {
            threshold,
            ..Default::default()
        };

        for process in &report.processes {
            let delta = process.delta();
            if delta == 0 || delta < threshold {
                continue;
            }

            match signaller.signal_terminate(process.pid) {
                Ok(()) => {
                    info!(
                        pid = process.pid,
                        name = %process.name,
                        user = %process.user,
                        delta,
                        total,
                        threshold,
                        "process exceeded CPU threshold, terminated"
                    );
                    outcome.signalled.push(process.pid);
                }
                Err(TerminateError::PermissionDenied { pid }) => {
                    warn!(
                        pid,
                        name = %process.name,
                        "not permitted to terminate process over CPU threshold; run rpimond as root"
                    );
                    outcome.denied.push(pid);
                }
                Err(TerminateError::NoSuchProcess { pid }) => {
                    debug!(pid, "process exited before it could be terminated");
                    outcome.vanished.push(pid);
                }
                Err(e) => {
                    warn!(pid = process.pid, error = %e, "failed to terminate process");
                    outcome.failed.push(process.pid);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::RecordingSignaller;
    use crate::collector::{MockFs, Sampler, SourcePaths};
    use crate::model::{CoreCounters, CpuDelta, ProcessRecord, RamSnapshot};
    use chrono::Utc;

    fn report(total_idle: u64, procs: &[(u32, u64)]) -> CycleReport {
        CycleReport {
            cycle: 1,
            timestamp: Utc::now(),
            cpu: CpuDelta {
                aggregate: CoreCounters {
                    idle: total_idle,
                    ..Default::default()
                },
                cores: vec![],
                temperature_mc: None,
            },
            processes: procs
                .iter()
                .map(|&(pid, delta)| ProcessRecord {
                    pid,
                    name: format!("proc{}", pid),
                    uid: 1000,
                    ticks: 1000 + delta,
                    prev_ticks: 1000,
                    ..Default::default()
                })
                .collect(),
            ram: RamSnapshot::default(),
            external_temp: None,
        }
    }

    #[test]
    fn test_threshold_for() {
        assert_eq!(threshold_for(90, 400), 360);
        assert_eq!(threshold_for(33, 10), 3);
        assert_eq!(threshold_for(0, 400), 0);
        assert_eq!(threshold_for(100, 400), 400);
        assert_eq!(threshold_for(99, u64::MAX), (u64::MAX as u128 * 99 / 100) as u64);
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(EvictionPolicy::new(99).is_ok());
        assert_eq!(
            EvictionPolicy::new(100),
            Err(ConfigError::ThresholdOutOfRange(100))
        );
    }

    #[test]
    fn test_evaluate_kills_hog_only() {
        let policy = EvictionPolicy::new(90).unwrap();
        let signaller = RecordingSignaller::new();
        let r = report(400, &[(10, 5), (2000, 380), (2001, 359)]);

        let outcome = policy.evaluate(&r, &signaller);
        assert_eq!(outcome.threshold, 360);
        assert_eq!(outcome.signalled, vec![2000]);
        assert_eq!(signaller.signalled(), vec![2000]);
    }

    #[test]
    fn test_evaluate_equal_to_threshold_is_candidate() {
        let policy = EvictionPolicy::new(50).unwrap();
        let signaller = RecordingSignaller::new();
        let outcome = policy.evaluate(&report(100, &[(7, 50)]), &signaller);
        assert_eq!(outcome.signalled, vec![7]);
    }

    #[test]
    fn test_percent_zero_spares_idle() {
        let policy = EvictionPolicy::new(0).unwrap();
        let signaller = RecordingSignaller::new();
        let outcome = policy.evaluate(&report(100, &[(1, 0), (2, 1), (3, 0), (4, 7)]), &signaller);
        assert_eq!(outcome.threshold, 0);
        assert_eq!(outcome.signalled, vec![2, 4]);
    }

    #[test]
    fn test_privilege_error_continues() {
        let policy = EvictionPolicy::new(10).unwrap();
        let signaller = RecordingSignaller::new();
        signaller.deny(5);
        signaller.mark_missing(6);

        let outcome = policy.evaluate(&report(100, &[(5, 50), (6, 50), (8, 50)]), &signaller);
        assert_eq!(outcome.denied, vec![5]);
        assert_eq!(outcome.vanished, vec![6]);
        assert_eq!(outcome.signalled, vec![8]);
        assert_eq!(outcome.candidates(), 3);
    }

    #[test]
    fn test_repeat_offender_signalled_every_cycle() {
        let policy = EvictionPolicy::new(50).unwrap();
        let signaller = RecordingSignaller::new();
        let r = report(100, &[(9, 80)]);
        policy.evaluate(&r, &signaller);
        policy.evaluate(&r, &signaller);
        assert_eq!(signaller.signalled(), vec![9, 9]);
    }

    #[test]
    fn test_zero_total_signals_nothing() {
        let policy = EvictionPolicy::new(90).unwrap();
        let signaller = RecordingSignaller::new();
        let outcome = policy.evaluate(&report(0, &[(1000, 2), (2000, 500)]), &signaller);
        assert_eq!(outcome.candidates(), 0);
        assert!(signaller.signalled().is_empty());
    }

    #[test]
    fn test_counter_reset_cycle_spares_processes() {
        let fs = MockFs::pi_idle();
        let mut sampler = Sampler::new(fs.clone(), SourcePaths::default(), 4);
        let policy = EvictionPolicy::new(90).unwrap();
        let signaller = RecordingSignaller::new();

        // aggregate counters go backwards while bash runs 2 ticks
        fs.set_cpu_counters(
            CoreCounters {
                user: 100,
                idle: 100,
                ..Default::default()
            },
            4,
        );
        fs.set_process_ticks(1000, "bash", 102, 50);

        let report = sampler.sample().unwrap();
        assert_eq!(report.cpu.aggregate.total(), 0);
        assert_eq!(report.process(1000).unwrap().delta(), 2);

        let outcome = policy.evaluate(&report, &signaller);
        assert_eq!(outcome, EvictionOutcome::default());
        assert!(signaller.signalled().is_empty());
    }

    #[test]
    fn test_sampled_hog_is_evicted() {
        let fs = MockFs::pi_with_hog();
        let mut sampler = Sampler::new(fs.clone(), SourcePaths::default(), 4);
        let policy = EvictionPolicy::new(90).unwrap();
        let signaller = RecordingSignaller::new();

        // 400 ticks elapsed, all of them spent by the hog
        fs.set_cpu_counters(
            CoreCounters {
                user: 10_400,
                user_nice: 500,
                kernel: 3000,
                idle: 80_000,
                iowait: 1000,
                irq: 200,
                soft_irq: 100,
            },
            4,
        );
        fs.set_process_ticks(2000, "cpu_bomber", 5400, 10);

        let report = sampler.sample().unwrap();
        let outcome = policy.evaluate(&report, &signaller);
        assert_eq!(outcome.threshold, 360);
        assert_eq!(outcome.signalled, vec![2000]);
    }

    #[test]
    fn test_empty_cycle() {
        let policy = EvictionPolicy::new(90).unwrap();
        let signaller = RecordingSignaller::new();
        let outcome = policy.evaluate(&report(0, &[]), &signaller);
        assert_eq!(outcome, EvictionOutcome::default());
    }
}

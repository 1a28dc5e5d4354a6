//! One sampling cycle: read every source, diff against the retained
//! baselines, and hand back an immutable [`CycleReport`].

use crate::actuator::Thermometer;
use crate::collector::procfs::{CollectError, ProcessCollector, SystemCollector};
use crate::collector::traits::FileSystem;
use crate::model::{CpuSnapshot, CycleReport};
use crate::rates::TickBaseline;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Roots of the pseudo-filesystems the sampler reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub proc: PathBuf,
    pub sys: PathBuf,
    pub etc: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            proc: PathBuf::from("/proc"),
            sys: PathBuf::from("/sys"),
            etc: PathBuf::from("/etc"),
        }
    }
}

/// Drives sampling cycles and owns the CPU and per-pid baselines.
///
/// Baselines only move forward after a cycle that read every mandatory
/// source, so a failed cycle leaves the next one diffing against the last
/// good state.
pub struct Sampler<F: FileSystem> {
    system: SystemCollector<F>,
    processes: ProcessCollector<F>,
    thermometer: Option<Arc<dyn Thermometer>>,
    cpu_baseline: Option<CpuSnapshot>,
    ticks: TickBaseline,
    cycle: u64,
}

impl<F: FileSystem + Clone> Sampler<F> {
    /// Creates a sampler, loads user and group names, and takes the startup
    /// baseline so the first report already carries a real delta.
    ///
    /// `core_count` is normally [`logical_processors`](crate::collector::procfs::logical_processors).
    pub fn new(fs: F, paths: SourcePaths, core_count: usize) -> Self {
        let system = SystemCollector::new(fs.clone(), &paths.proc, &paths.sys, core_count);
        let mut processes = ProcessCollector::new(fs, &paths.proc);
        processes.load_identities(&paths.etc);

        let mut sampler = Self {
            system,
            processes,
            thermometer: None,
            cpu_baseline: None,
            ticks: TickBaseline::new(),
            cycle: 0,
        };
        if let Err(e) = sampler.prime() {
            warn!(error = %e, "initial baseline unavailable, first cycle will report zero deltas");
        }
        sampler
    }
}

impl<F: FileSystem> Sampler<F> {
    /// Attaches an external thermometer read once per cycle.
    pub fn with_thermometer(mut self, thermometer: Arc<dyn Thermometer>) -> Self {
        self.thermometer = Some(thermometer);
        self
    }

    pub fn core_count(&self) -> usize {
        self.system.core_count()
    }

    /// Number of successful cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Pids currently held in the tick baseline.
    pub fn tracked_pids(&self) -> usize {
        self.ticks.len()
    }

    /// Reads CPU counters and process ticks into the baselines without
    /// producing a report.
    pub fn prime(&mut self) -> Result<(), CollectError> {
        let cpu = self.system.collect_cpu()?;
        let processes = self.processes.collect_all_processes()?;
        self.ticks
            .replace_with(processes.iter().map(|p| (p.pid, p.ticks)));
        self.cpu_baseline = Some(cpu);
        if self.ticks.is_empty() {
            debug!("baseline primed, no user processes visible");
        } else {
            debug!(pids = self.ticks.len(), "baseline primed");
        }
        Ok(())
    }

    /// Runs one sampling cycle.
    ///
    /// Fails without touching the baselines when `/proc/stat`,
    /// `/proc/meminfo` or the `/proc` listing cannot be read.
    pub fn sample(&mut self) -> Result<CycleReport, CollectError> {
        let cpu = self.system.collect_cpu()?;
        let ram = self.system.collect_ram()?;
        let mut processes = self.processes.collect_all_processes()?;

        for record in &mut processes {
            record.prev_ticks = self.ticks.previous(record.pid, record.ticks);
        }

        let cpu_delta = match &self.cpu_baseline {
            Some(prev) => cpu.delta_since(prev),
            None => cpu.delta_since(&cpu),
        };

        let external_temp = self.thermometer.as_ref().and_then(|t| {
            t.read_temperature()
                .map_err(|e| debug!(error = %e, "external temperature unavailable"))
                .ok()
        });

        self.ticks
            .replace_with(processes.iter().map(|p| (p.pid, p.ticks)));
        self.cpu_baseline = Some(cpu);
        self.cycle += 1;

        Ok(CycleReport {
            cycle: self.cycle,
            timestamp: Utc::now(),
            cpu: cpu_delta,
            processes,
            ram,
            external_temp,
        })
    }
}

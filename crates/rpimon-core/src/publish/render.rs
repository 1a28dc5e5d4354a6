//! Text renderings of a cycle report, one per published artifact.

use crate::model::{CoreCounters, CpuDelta, ProcessRecord, RamSnapshot};
use std::fmt;

/// `ram` artifact.
pub struct RamText<'a>(pub &'a RamSnapshot);

impl fmt::Display for RamText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ram total: {} kB", self.0.total_kb)?;
        writeln!(f, "Ram free: {} kB", self.0.free_kb)?;
        writeln!(f, "Ram available: {} kB", self.0.available_kb)
    }
}

/// `cpu` artifact: SoC temperature, aggregate deltas, then one block per core.
pub struct CpuText<'a>(pub &'a CpuDelta);

fn write_counters(f: &mut fmt::Formatter<'_>, c: &CoreCounters) -> fmt::Result {
    writeln!(f, "User norm: {}", c.user)?;
    writeln!(f, "User nice: {}", c.user_nice)?;
    writeln!(f, "Kernel: {}", c.kernel)?;
    writeln!(f, "Idle: {}", c.idle)?;
    writeln!(f, "Iowait: {}", c.iowait)?;
    writeln!(f, "Irq: {}", c.irq)?;
    writeln!(f, "Soft irq: {}", c.soft_irq)
}

impl fmt::Display for CpuText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.temperature_mc {
            Some(mc) => writeln!(f, "CPU temp: {}", mc)?,
            None => writeln!(f, "CPU temp: n/a")?,
        }
        writeln!(f)?;

        writeln!(f, "Full CPU:")?;
        write_counters(f, &self.0.aggregate)?;
        writeln!(f)?;

        for (i, core) in self.0.cores.iter().enumerate() {
            writeln!(f, "Core {}:", i)?;
            write_counters(f, core)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// `proc` artifact: one block per process, separated by a blank line.
pub struct ProcText<'a>(pub &'a [ProcessRecord]);

impl fmt::Display for ProcText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in self.0 {
            writeln!(f, "Proc: {} {}", p.pid, p.name)?;
            writeln!(f, "State: {}", p.state)?;
            writeln!(f, "User: {} {}", p.uid, p.user)?;
            writeln!(f, "Group: {} {}", p.gid, p.group)?;
            writeln!(f, "Memory: {}/{} kB", p.vm_size_kb, p.vm_peak_kb)?;
            writeln!(f, "Swap: {} kB", p.vm_swap_kb)?;
            writeln!(f, "Threads: {}", p.threads)?;
            writeln!(f, "Max_cpus: {}", p.cpus_allowed)?;
            writeln!(f, "Cpu ticks: {}", p.delta())?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// `ext_temp` artifact.
pub struct ExtTempText(pub f64);

impl fmt::Display for ExtTempText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Temp: {:.6}", self.0)
    }
}

//! Data model shared by the sampler, the policy, the publisher and the
//! command channel.
//!
//! ```text
//! CycleReport
//!   ├── cpu: CpuDelta        <- CpuSnapshot(now) - CpuSnapshot(prev)
//!   ├── processes: Vec<ProcessRecord>   (sorted by pid, uid != 0)
//!   ├── ram: RamSnapshot
//!   └── external_temp
//! ```

mod cpu;
mod process;
mod snapshot;

pub use cpu::{CoreCounters, CpuDelta, CpuSnapshot};
pub use process::ProcessRecord;
pub use snapshot::{CycleReport, RamSnapshot};

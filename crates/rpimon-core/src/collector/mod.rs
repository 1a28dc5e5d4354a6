//! Metric acquisition for a single Linux host.
//!
//! Everything the agent measures is pulled as text from kernel pseudo-files,
//! so collectors only ever talk to a [`FileSystem`]. Production code passes
//! [`RealFs`]; tests pass a [`MockFs`] pre-filled with `/proc` content.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Sampler                            │
//! │  ┌──────────────────────┐   ┌──────────────────────────────┐ │
//! │  │  ProcessCollector    │   │     SystemCollector          │ │
//! │  │  - /proc/[pid]/status│   │  - /proc/stat                │ │
//! │  │  - /proc/[pid]/stat  │   │  - /proc/meminfo             │ │
//! │  │  - passwd / group    │   │  - thermal_zone0/temp        │ │
//! │  └──────────┬───────────┘   └──────────────┬───────────────┘ │
//! │             └──────────────┬───────────────┘                 │
//! │                     ┌──────▼──────┐    CpuSnapshot baseline  │
//! │                     │  FileSystem │    TickBaseline (pid)    │
//! │                     └──────┬──────┘                          │
//! └────────────────────────────┼─────────────────────────────────┘
//!                  ┌───────────┴───────────┐
//!           ┌──────▼──────┐         ┌──────▼──────┐
//!           │   RealFs    │         │   MockFs    │
//!           └─────────────┘         └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use rpimon_core::collector::{MockFs, Sampler, SourcePaths};
//!
//! let fs = MockFs::pi_idle();
//! let mut sampler = Sampler::new(fs, SourcePaths::default(), 4);
//! let report = sampler.sample().unwrap();
//! assert!(report.processes.iter().all(|p| p.uid != 0));
//! ```

pub mod mock;
pub mod procfs;
mod sampler;
pub mod traits;

pub use mock::MockFs;
pub use procfs::{CollectError, GroupResolver, ProcessCollector, SystemCollector, UserResolver};
pub use sampler::{Sampler, SourcePaths};
pub use traits::{FileSystem, RealFs};

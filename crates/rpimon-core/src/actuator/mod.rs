//! Capabilities the agent acts through: digital lines, process termination,
//! and an external thermometer.
//!
//! Each capability is a `Send + Sync` trait so the sampling thread and the
//! command sessions can share one `Arc<dyn ...>`. Tests swap in the doubles
//! from [`mock`] and [`MemoryLines`].

mod lines;
pub mod mock;
mod signal;
mod thermo;

pub use lines::{LineDriver, LineError, MemoryLines, SysfsGpio};
pub use mock::{FixedThermometer, RecordingSignaller};
pub use signal::{KillSignaller, ProcessSignaller, TerminateError, TerminationSignal};
pub use thermo::{FileThermometer, ThermoError, Thermometer};

//! Mock filesystem and canned `/proc` scenarios.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
pub use scenarios::{cpu_stat_text, stat_line, status_text};

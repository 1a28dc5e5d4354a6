//! Collectors for the Linux `/proc` filesystem.
//!
//! This module provides parsers and collectors for reading system and process
//! information from `/proc`, plus the SoC thermal zone and the `/etc` id
//! tables used to name process owners.

pub mod parser;
pub mod process;
pub mod system;

pub use parser::{GroupResolver, ParseError, UserResolver};
pub use process::{CollectError, ProcessCollector};
pub use system::{SystemCollector, logical_processors};

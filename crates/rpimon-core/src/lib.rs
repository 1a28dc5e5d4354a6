//! rpimon-core: shared library for the rpimon agent.
//!
//! Provides:
//! - `collector`: `/proc` readers and the per-cycle `Sampler`
//! - `model`: tick counters, process records, cycle reports
//! - `rates`: counter delta helpers and the pid-keyed tick baseline
//! - `policy`: CPU-share eviction policy
//! - `actuator`: digital lines, process termination, temperature capabilities
//! - `protocol`: command frames, status codes, pre-shared key gate
//! - `channel`: TCP command channel (listener, sessions, dispatch)
//! - `client`: blocking control client used by `rpimon-ctl`
//! - `publish`: text artifacts with atomic replacement
//! - `shared`: single-writer publication of cycle reports
//! - `config`: defaults and value parsers shared by the binaries

pub mod actuator;
pub mod channel;
pub mod client;
pub mod collector;
pub mod config;
pub mod model;
pub mod policy;
pub mod protocol;
pub mod publish;
pub mod rates;
pub mod shared;

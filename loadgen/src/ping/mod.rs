//! In-process ping targets for load benchmarks
//!
//! This module provides:
//! - `PingHost` hosting addressable ping targets with optional latency and failures
//! - `HostSet` owning the hosts started for a benchmark and shutting them down
//! - `PingSource` adapting a host to the load generator

mod host;
mod source;

pub use host::{HostConfig, HostSet, PingError, PingHost, PingTarget};
pub use source::PingSource;

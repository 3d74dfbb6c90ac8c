//! Ping load generator library
//!
//! This module exports the load generator, the in-process ping host, and the
//! benchmark harness for use by the binary, integration tests, and benches.

pub mod bench;
pub mod config;
pub mod generator;
pub mod ping;

// Re-export commonly used types
pub use generator::{
    ConcurrentLoadGenerator, LoadGenError, RunConfiguration, RunResult, StateRefresh, TargetSource,
};
pub use ping::{HostConfig, HostSet, PingHost, PingSource};

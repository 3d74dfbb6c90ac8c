//! Concurrent load generator
//!
//! This module provides:
//! - `RunConfiguration` describing a fixed workload (workers × blocks × requests)
//! - `TargetSource` trait for resolving targets and issuing requests
//! - `ConcurrentLoadGenerator` which drives the workload and reports a `RunResult`

mod runner;
mod target;
mod types;

pub use runner::ConcurrentLoadGenerator;
pub use target::{FnTargetSource, TargetSource};
pub use types::{
    BlockDispatch, LatencyStats, LoadGenError, RequestError, RunConfiguration, RunResult,
    StateRefresh, TargetError,
};

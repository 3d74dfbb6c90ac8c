//! Ping benchmark harness
//!
//! Runs the ping scenarios through the load generator with a warm-up pass,
//! several measured iterations, and comparison against a stored baseline.
//!
//! | Scenario          | Workers | Blocks | Requests/block | Total       |
//! |-------------------|---------|--------|----------------|-------------|
//! | `SequentialPing`  | 1       | 1      | 50,000         | 50,000      |
//! | `ConcurrentPing`  | 250     | 30     | 50,000         | 375,000,000 |
//!
//! `SequentialPing` is the calibration baseline: one worker, one target,
//! no overlapping requests.

mod baseline;
mod runner;

pub use baseline::{Baseline, BaselineFile, Comparison, Direction, Metric, Verdict};
pub use runner::{
    BenchmarkMetrics, BenchmarkReport, BenchmarkResult, BenchmarkRunConfig, BenchmarkRunner,
};

use crate::config::{BenchmarkSelection, WorkloadConfig};
use crate::generator::{LoadGenError, RunConfiguration};

/// Ping benchmark scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingBenchmark {
    /// Single worker, single block
    SequentialPing,
    /// 250 workers, 30 blocks each
    ConcurrentPing,
}

impl PingBenchmark {
    /// Get the scenario name for display and baseline keys
    pub fn name(&self) -> &'static str {
        match self {
            PingBenchmark::SequentialPing => "SEQUENTIAL_PING",
            PingBenchmark::ConcurrentPing => "CONCURRENT_PING",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PingBenchmark::SequentialPing => "50K Local Msgs",
            PingBenchmark::ConcurrentPing => "250 workers x 30 blocks of 50K Local Msgs",
        }
    }

    /// `(max_concurrency, blocks_per_worker)`
    pub fn shape(&self) -> (usize, usize) {
        match self {
            PingBenchmark::SequentialPing => (1, 1),
            PingBenchmark::ConcurrentPing => (250, 30),
        }
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, PingBenchmark::SequentialPing)
    }

    /// Scenarios included in a selection, baseline first
    pub fn selected(selection: BenchmarkSelection) -> Vec<Self> {
        match selection {
            BenchmarkSelection::Sequential => vec![PingBenchmark::SequentialPing],
            BenchmarkSelection::Concurrent => vec![PingBenchmark::ConcurrentPing],
            BenchmarkSelection::All => {
                vec![PingBenchmark::SequentialPing, PingBenchmark::ConcurrentPing]
            }
        }
    }

    /// Build the run configuration, applying any overrides
    pub fn run_configuration(
        &self,
        workload: &WorkloadConfig,
    ) -> Result<RunConfiguration, LoadGenError> {
        let (max_concurrency, blocks_per_worker) = self.shape();
        Ok(RunConfiguration::new(
            workload.max_concurrency.unwrap_or(max_concurrency),
            workload.blocks_per_worker.unwrap_or(blocks_per_worker),
            workload.requests_per_block,
        )?
        .with_state_refresh(workload.state_refresh)
        .with_dispatch(workload.dispatch)
        .with_intermediate_results(workload.log_blocks))
    }
}

/// Statistical summary of a metric across iterations
#[derive(Debug, Clone, Default)]
pub struct MetricStats {
    pub mean: f64,
    pub stddev: f64,
}

impl MetricStats {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;

        let variance = if samples.len() > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };

        Some(Self {
            mean,
            stddev: variance.sqrt(),
        })
    }

    /// Format as "mean ± stddev" with the given unit
    pub fn format(&self, unit: &str) -> String {
        if self.stddev < 0.1 {
            format!("{:.1}{}", self.mean, unit)
        } else {
            format!("{:.1}{} ± {:.1}{}", self.mean, unit, self.stddev, unit)
        }
    }
}

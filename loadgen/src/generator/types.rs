//! Load generator types and error definitions

use std::time::Duration;
use thiserror::Error;

/// Errors that end a load run (or prevent one from being configured)
#[derive(Debug, Error)]
pub enum LoadGenError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Fatal run error (worker {worker_id:?}): {reason}")]
    FatalRunError {
        worker_id: Option<usize>,
        reason: String,
    },
}

/// A single request failed. Counted in the run result, never propagated.
#[derive(Debug, Error)]
#[error("Request failed: {0}")]
pub struct RequestError(pub String);

/// A worker could not obtain its target
#[derive(Debug, Error)]
#[error("Target resolution failed: {0}")]
pub struct TargetError(pub String);

/// How often a worker asks the target source for its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateRefresh {
    /// Resolve once when the worker starts and reuse it for every block
    #[default]
    Worker,
    /// Resolve again at the start of every block
    Block,
}

impl StateRefresh {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "worker" | "reuse" => Some(Self::Worker),
            "block" | "refresh" => Some(Self::Block),
            _ => None,
        }
    }
}

/// How the requests of one block are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockDispatch {
    /// Concurrent whenever more than one worker runs
    #[default]
    Auto,
    /// One request at a time
    Sequential,
    /// All requests of the block in flight together (ignored for one worker)
    Concurrent,
}

impl BlockDispatch {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "sequential" => Some(Self::Sequential),
            "concurrent" => Some(Self::Concurrent),
            _ => None,
        }
    }

    /// Whether requests within a block overlap for the given worker count.
    /// A single worker always issues one request at a time.
    pub fn is_concurrent(&self, max_concurrency: usize) -> bool {
        if max_concurrency <= 1 {
            return false;
        }
        match self {
            BlockDispatch::Auto | BlockDispatch::Concurrent => true,
            BlockDispatch::Sequential => false,
        }
    }
}

/// Immutable description of one load run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    max_concurrency: usize,
    blocks_per_worker: usize,
    requests_per_block: usize,
    total_requests: u64,
    /// Target resolution policy
    pub state_refresh: StateRefresh,
    /// Request dispatch within a block
    pub dispatch: BlockDispatch,
    /// Log every completed block at info level
    pub log_intermediate_results: bool,
}

impl RunConfiguration {
    /// Validate the three workload knobs. Every count must be non-zero and
    /// their product must fit in a `u64`.
    pub fn new(
        max_concurrency: usize,
        blocks_per_worker: usize,
        requests_per_block: usize,
    ) -> Result<Self, LoadGenError> {
        for (name, value) in [
            ("max_concurrency", max_concurrency),
            ("blocks_per_worker", blocks_per_worker),
            ("requests_per_block", requests_per_block),
        ] {
            if value == 0 {
                return Err(LoadGenError::InvalidConfiguration(format!(
                    "{} must be positive",
                    name
                )));
            }
        }

        let total_requests = (max_concurrency as u64)
            .checked_mul(blocks_per_worker as u64)
            .and_then(|n| n.checked_mul(requests_per_block as u64))
            .ok_or_else(|| {
                LoadGenError::InvalidConfiguration("total request count overflows".to_string())
            })?;

        Ok(Self {
            max_concurrency,
            blocks_per_worker,
            requests_per_block,
            total_requests,
            state_refresh: StateRefresh::default(),
            dispatch: BlockDispatch::default(),
            log_intermediate_results: false,
        })
    }

    pub fn with_state_refresh(mut self, state_refresh: StateRefresh) -> Self {
        self.state_refresh = state_refresh;
        self
    }

    pub fn with_dispatch(mut self, dispatch: BlockDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_intermediate_results(mut self, enabled: bool) -> Self {
        self.log_intermediate_results = enabled;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn blocks_per_worker(&self) -> usize {
        self.blocks_per_worker
    }

    pub fn requests_per_block(&self) -> usize {
        self.requests_per_block
    }

    /// `max_concurrency * blocks_per_worker * requests_per_block`
    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Upper bound on requests in flight at any instant
    pub fn max_in_flight(&self) -> u64 {
        if self.dispatch.is_concurrent(self.max_concurrency) {
            self.max_concurrency as u64 * self.requests_per_block as u64
        } else {
            self.max_concurrency as u64
        }
    }
}

/// Block durations collected during a run
#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    pub samples: Vec<Duration>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, latency: Duration) {
        self.samples.push(latency);
    }

    pub fn merge(&mut self, other: LatencyStats) {
        self.samples.extend(other.samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Calculate percentile (0-100)
    fn percentile(&self, p: f64) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort();

        let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn p50(&self) -> Option<Duration> {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Option<Duration> {
        self.percentile(99.0)
    }
}

/// Aggregate outcome of one run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Wall-clock time from first dispatch to last block completion
    pub elapsed: Duration,
    /// Requests issued, successful or not
    pub total_requests: u64,
    /// Requests that returned an error
    pub failed_requests: u64,
    /// Per-block completion times across all workers
    pub block_latencies: LatencyStats,
}

impl RunResult {
    /// Requests per second over the whole run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_requests as f64 / secs
        } else {
            0.0
        }
    }

    pub fn succeeded_requests(&self) -> u64 {
        self.total_requests - self.failed_requests
    }

    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failed_requests as f64 / self.total_requests as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_counts_rejected() {
        for (c, b, r) in [(0, 1, 1), (1, 0, 1), (1, 1, 0)] {
            let result = RunConfiguration::new(c, b, r);
            assert!(matches!(
                result,
                Err(LoadGenError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_total_requests() {
        let config = RunConfiguration::new(250, 30, 50_000).unwrap();
        assert_eq!(config.total_requests(), 375_000_000);
        assert_eq!(config.state_refresh, StateRefresh::Worker);
    }

    #[test]
    fn test_overflow_rejected() {
        let result = RunConfiguration::new(usize::MAX, usize::MAX, 2);
        assert!(matches!(
            result,
            Err(LoadGenError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_auto_dispatch() {
        assert!(!BlockDispatch::Auto.is_concurrent(1));
        assert!(BlockDispatch::Auto.is_concurrent(2));
        assert!(!BlockDispatch::Concurrent.is_concurrent(1));
        assert!(BlockDispatch::Concurrent.is_concurrent(2));
        assert!(!BlockDispatch::Sequential.is_concurrent(2));

        let config = RunConfiguration::new(4, 1, 8).unwrap();
        assert_eq!(config.max_in_flight(), 32);
        let config = config.with_dispatch(BlockDispatch::Sequential);
        assert_eq!(config.max_in_flight(), 4);
    }

    #[test]
    fn test_parse_policies() {
        assert_eq!(StateRefresh::parse("Block"), Some(StateRefresh::Block));
        assert_eq!(StateRefresh::parse("reuse"), Some(StateRefresh::Worker));
        assert_eq!(StateRefresh::parse("never"), None);
        assert_eq!(
            BlockDispatch::parse("sequential"),
            Some(BlockDispatch::Sequential)
        );
    }

    #[test]
    fn test_latency_percentiles() {
        let mut stats = LatencyStats::new();
        assert!(stats.p99().is_none());
        for ms in 1..=100 {
            stats.record(Duration::from_millis(ms));
        }
        assert_eq!(stats.p50(), Some(Duration::from_millis(51)));
        assert_eq!(stats.p99(), Some(Duration::from_millis(99)));
    }

    #[test]
    fn test_throughput() {
        let result = RunResult {
            elapsed: Duration::from_secs(2),
            total_requests: 1000,
            failed_requests: 250,
            block_latencies: LatencyStats::new(),
        };
        assert_eq!(result.throughput(), 500.0);
        assert_eq!(result.succeeded_requests(), 750);
        assert_eq!(result.error_rate(), 0.25);
    }
}

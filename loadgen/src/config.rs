//! Load generator configuration
//!
//! Configuration is loaded from environment variables prefixed with `LOADGEN_`.
//! Unset or unparsable variables keep their defaults.

use crate::generator::{BlockDispatch, StateRefresh};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Requests per block used by both ping scenarios
pub const DEFAULT_REQUESTS_PER_BLOCK: usize = 50_000;

/// Main configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Which benchmarks to run
    pub benchmark: BenchmarkSelection,
    /// Measured iterations per benchmark
    pub iterations: usize,
    /// Run a warm-up pass before measuring
    pub warmup: bool,
    /// Print Prometheus exposition text on exit
    pub print_metrics: bool,

    /// Workload overrides
    pub workload: WorkloadConfig,

    /// Ping host configuration
    pub ping: PingConfig,

    /// Baseline configuration
    pub baseline: BaselineConfig,
}

/// Benchmark selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkSelection {
    Sequential,
    Concurrent,
    All,
}

impl BenchmarkSelection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "concurrent" => Some(Self::Concurrent),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Workload overrides applied on top of a scenario's shape
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Override for the number of workers
    pub max_concurrency: Option<usize>,
    /// Override for blocks per worker
    pub blocks_per_worker: Option<usize>,
    /// Requests issued per block
    pub requests_per_block: usize,
    /// Target resolution policy
    pub state_refresh: StateRefresh,
    /// Request dispatch within a block
    pub dispatch: BlockDispatch,
    /// Log every completed block
    pub log_blocks: bool,
}

/// Ping host configuration
#[derive(Debug, Clone, Default)]
pub struct PingConfig {
    /// Simulated latency per ping
    pub latency: Duration,
    /// Probability that a ping fails
    pub failure_rate: f64,
}

/// Baseline storage and comparison
#[derive(Debug, Clone)]
pub struct BaselineConfig {
    /// Path to the baseline file
    pub path: PathBuf,
    /// Store this run's results as the new baseline
    pub save: bool,
    /// Throughput drop (percent) treated as a regression
    pub regression_threshold_pct: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            benchmark: BenchmarkSelection::All,
            iterations: 3,
            warmup: true,
            print_metrics: false,
            workload: WorkloadConfig::default(),
            ping: PingConfig::default(),
            baseline: BaselineConfig::default(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            blocks_per_worker: None,
            requests_per_block: DEFAULT_REQUESTS_PER_BLOCK,
            state_refresh: StateRefresh::Worker,
            dispatch: BlockDispatch::Auto,
            log_blocks: false,
        }
    }
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".loadgen-baseline.json"),
            save: false,
            regression_threshold_pct: 15.0,
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("LOADGEN_BENCHMARK")
            && let Some(selection) = BenchmarkSelection::parse(&val)
        {
            config.benchmark = selection;
        }
        if let Ok(val) = env::var("LOADGEN_ITERATIONS")
            && let Ok(n) = val.parse::<usize>()
            && n > 0
        {
            config.iterations = n;
        }
        if let Ok(val) = env::var("LOADGEN_WARMUP") {
            config.warmup = parse_flag(&val);
        }
        if let Ok(val) = env::var("LOADGEN_PRINT_METRICS") {
            config.print_metrics = parse_flag(&val);
        }

        // Workload
        if let Ok(val) = env::var("LOADGEN_MAX_CONCURRENCY")
            && let Ok(n) = val.parse()
        {
            config.workload.max_concurrency = Some(n);
        }
        if let Ok(val) = env::var("LOADGEN_BLOCKS_PER_WORKER")
            && let Ok(n) = val.parse()
        {
            config.workload.blocks_per_worker = Some(n);
        }
        if let Ok(val) = env::var("LOADGEN_REQUESTS_PER_BLOCK")
            && let Ok(n) = val.parse()
        {
            config.workload.requests_per_block = n;
        }
        if let Ok(val) = env::var("LOADGEN_STATE_REFRESH")
            && let Some(refresh) = StateRefresh::parse(&val)
        {
            config.workload.state_refresh = refresh;
        }
        if let Ok(val) = env::var("LOADGEN_DISPATCH")
            && let Some(dispatch) = BlockDispatch::parse(&val)
        {
            config.workload.dispatch = dispatch;
        }
        if let Ok(val) = env::var("LOADGEN_LOG_BLOCKS") {
            config.workload.log_blocks = parse_flag(&val);
        }

        // Ping host
        if let Ok(val) = env::var("LOADGEN_PING_LATENCY_US")
            && let Ok(us) = val.parse::<u64>()
        {
            config.ping.latency = Duration::from_micros(us);
        }
        if let Ok(val) = env::var("LOADGEN_PING_FAILURE_RATE")
            && let Ok(rate) = val.parse::<f64>()
            && (0.0..=1.0).contains(&rate)
        {
            config.ping.failure_rate = rate;
        }

        // Baseline
        if let Ok(path) = env::var("LOADGEN_BASELINE_PATH")
            && !path.is_empty()
        {
            config.baseline.path = PathBuf::from(path);
        }
        if let Ok(val) = env::var("LOADGEN_SAVE_BASELINE") {
            config.baseline.save = parse_flag(&val);
        }
        if let Ok(val) = env::var("LOADGEN_REGRESSION_PCT")
            && let Ok(pct) = val.parse::<f64>()
        {
            config.baseline.regression_threshold_pct = pct;
        }

        config
    }
}

//! Stored benchmark baselines and regression detection

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Change (in percent) below which a metric counts as unchanged
const STEADY_BAND_PCT: f64 = 5.0;

/// Stored scenario summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub benchmark: String,
    pub timestamp: String,
    pub total_requests: u64,
    pub throughput: f64,
    pub error_rate_pct: f64,
    pub block_p99_ms: Option<f64>,
}

/// Every stored baseline, keyed by scenario name
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaselineFile {
    entries: BTreeMap<String, Baseline>,
}

impl BaselineFile {
    /// Read the baseline file. A missing file is an empty set; an unreadable
    /// one is an error so it never gets overwritten by `persist`.
    pub fn open(path: &Path) -> io::Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(io::Error::from),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, benchmark: &str) -> Option<&Baseline> {
        self.entries.get(benchmark)
    }

    /// Replace the entry for the baseline's scenario
    pub fn record(&mut self, baseline: Baseline) {
        self.entries.insert(baseline.benchmark.clone(), baseline);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn persist(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)
    }
}

/// Which way a metric is supposed to move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Metrics compared against a baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Requests per second
    Throughput,
    /// 99th percentile block duration in milliseconds
    BlockP99,
    /// Failed requests in percent
    ErrorRate,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Throughput, Metric::BlockP99, Metric::ErrorRate];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Throughput => "Throughput",
            Metric::BlockP99 => "Block P99",
            Metric::ErrorRate => "Error Rate",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Metric::Throughput => Direction::HigherIsBetter,
            Metric::BlockP99 | Metric::ErrorRate => Direction::LowerIsBetter,
        }
    }

    pub fn render(&self, value: f64) -> String {
        match self {
            Metric::Throughput => format!("{:.0} req/s", value),
            Metric::BlockP99 => format!("{:.2}ms", value),
            Metric::ErrorRate => format!("{:.2}%", value),
        }
    }

    /// The stored value of this metric
    pub fn stored(&self, baseline: &Baseline) -> Option<f64> {
        match self {
            Metric::Throughput => Some(baseline.throughput),
            Metric::BlockP99 => baseline.block_p99_ms,
            Metric::ErrorRate => Some(baseline.error_rate_pct),
        }
    }
}

/// Outcome of comparing one metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Moved the wrong way by more than the threshold
    Regression,
    /// Moved the wrong way, within the threshold
    Drifted,
    Steady,
    Improved,
}

impl Verdict {
    pub fn tag(&self) -> &'static str {
        match self {
            Verdict::Regression => "[REGRESSION]",
            Verdict::Drifted => "[WARNING]",
            Verdict::Steady => "[OK]",
            Verdict::Improved => "[IMPROVED]",
        }
    }
}

/// One metric of the current run next to its baseline
#[derive(Debug, Clone)]
pub struct Comparison {
    pub metric: Metric,
    pub current: Option<f64>,
    pub baseline: Option<f64>,
    /// `None` when either side is missing or the baseline is zero
    pub change_pct: Option<f64>,
    pub verdict: Option<Verdict>,
}

impl Comparison {
    pub fn of(
        metric: Metric,
        current: Option<f64>,
        baseline: Option<f64>,
        threshold_pct: f64,
    ) -> Self {
        let change_pct = current
            .zip(baseline)
            .filter(|&(_, b)| b > 0.0)
            .map(|(c, b)| (c - b) / b * 100.0);

        let verdict = change_pct.map(|pct| {
            // Positive when the metric moved the right way
            let gain = match metric.direction() {
                Direction::HigherIsBetter => pct,
                Direction::LowerIsBetter => -pct,
            };
            if gain < -threshold_pct {
                Verdict::Regression
            } else if gain.abs() < STEADY_BAND_PCT {
                Verdict::Steady
            } else if gain > 0.0 {
                Verdict::Improved
            } else {
                Verdict::Drifted
            }
        });

        Self {
            metric,
            current,
            baseline,
            change_pct,
            verdict,
        }
    }

    pub fn is_regression(&self) -> bool {
        self.verdict == Some(Verdict::Regression)
    }

    pub fn has_values(&self) -> bool {
        self.current.is_some() || self.baseline.is_some()
    }

    pub fn current_text(&self) -> String {
        self.render(self.current)
    }

    pub fn baseline_text(&self) -> String {
        self.render(self.baseline)
    }

    /// Signed change with its verdict tag, empty without a baseline
    pub fn change_text(&self) -> String {
        match (self.change_pct, self.verdict) {
            (Some(pct), Some(verdict)) => format!("({:+.1}%) {}", pct, verdict.tag()),
            _ => String::new(),
        }
    }

    fn render(&self, value: Option<f64>) -> String {
        value.map_or_else(|| "N/A".to_string(), |v| self.metric.render(v))
    }
}

//! Benchmark runner with warm-up, multiple iterations, and baseline comparison

use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use super::baseline::{Baseline, BaselineFile, Comparison, Metric};
use super::{MetricStats, PingBenchmark};
use crate::config::{Config, WorkloadConfig};
use crate::generator::{ConcurrentLoadGenerator, LoadGenError, RunResult};
use crate::ping::{PingHost, PingSource};

/// Configuration for benchmark runs
#[derive(Debug, Clone)]
pub struct BenchmarkRunConfig {
    /// Scenario to run
    pub benchmark: PingBenchmark,
    /// Number of measured iterations
    pub iterations: usize,
    /// Run one block per worker before measuring
    pub warmup: bool,
    /// Workload overrides
    pub workload: WorkloadConfig,
    /// Path to baseline file
    pub baseline_path: PathBuf,
    /// Regression threshold as percentage (default: 15%)
    pub regression_threshold_pct: f64,
}

impl BenchmarkRunConfig {
    pub fn new(benchmark: PingBenchmark, config: &Config) -> Self {
        Self {
            benchmark,
            iterations: config.iterations.max(1),
            warmup: config.warmup,
            workload: config.workload.clone(),
            baseline_path: config.baseline.path.clone(),
            regression_threshold_pct: config.baseline.regression_threshold_pct,
        }
    }
}

/// Metrics extracted from a single iteration
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkMetrics {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub elapsed_ms: f64,
    pub throughput: f64,
    pub error_rate: f64,
    pub block_p99_ms: Option<f64>,
}

impl BenchmarkMetrics {
    pub fn from_result(result: &RunResult) -> Self {
        Self {
            total_requests: result.total_requests,
            failed_requests: result.failed_requests,
            elapsed_ms: result.elapsed.as_secs_f64() * 1000.0,
            throughput: result.throughput(),
            error_rate: result.error_rate(),
            block_p99_ms: result
                .block_latencies
                .p99()
                .map(|d| d.as_secs_f64() * 1000.0),
        }
    }
}

/// Aggregated results from multiple iterations
#[derive(Debug)]
pub struct BenchmarkReport {
    pub benchmark: PingBenchmark,
    pub iterations: usize,
    pub warmup: bool,
    pub total_requests: u64,
    pub elapsed: MetricStats,
    pub throughput: MetricStats,
    pub error_rate: MetricStats,
    pub block_p99: Option<MetricStats>,
}

impl BenchmarkReport {
    /// Aggregate metrics from multiple iterations
    pub fn from_metrics(benchmark: PingBenchmark, warmup: bool, metrics: &[BenchmarkMetrics]) -> Self {
        let elapsed: Vec<f64> = metrics.iter().map(|m| m.elapsed_ms).collect();
        let throughput: Vec<f64> = metrics.iter().map(|m| m.throughput).collect();
        let errors: Vec<f64> = metrics.iter().map(|m| m.error_rate * 100.0).collect();
        let block_p99: Vec<f64> = metrics.iter().filter_map(|m| m.block_p99_ms).collect();

        Self {
            benchmark,
            iterations: metrics.len(),
            warmup,
            total_requests: metrics.iter().map(|m| m.total_requests).sum(),
            elapsed: MetricStats::from_samples(&elapsed).unwrap_or_default(),
            throughput: MetricStats::from_samples(&throughput).unwrap_or_default(),
            error_rate: MetricStats::from_samples(&errors).unwrap_or_default(),
            block_p99: MetricStats::from_samples(&block_p99),
        }
    }

    /// Value of a compared metric in this report
    pub fn value_of(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Throughput => Some(self.throughput.mean),
            Metric::BlockP99 => self.block_p99.as_ref().map(|s| s.mean),
            Metric::ErrorRate => Some(self.error_rate.mean),
        }
    }

    /// Convert to baseline format for storage
    pub fn to_baseline(&self) -> Baseline {
        Baseline {
            benchmark: self.benchmark.name().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_requests: self.total_requests,
            throughput: self.throughput.mean,
            error_rate_pct: self.error_rate.mean,
            block_p99_ms: self.block_p99.as_ref().map(|s| s.mean),
        }
    }
}

/// Runs one ping scenario against a host
pub struct BenchmarkRunner {
    config: BenchmarkRunConfig,
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkRunConfig) -> Self {
        Self { config }
    }

    /// Run the full benchmark with warm-up, iterations, and comparison
    pub async fn run(&self, host: &PingHost) -> Result<BenchmarkResult, LoadGenError> {
        let benchmark = self.config.benchmark;
        let run_config = benchmark.run_configuration(&self.config.workload)?;
        let expected = run_config.total_requests();
        let generator = ConcurrentLoadGenerator::new(run_config, PingSource::new(host.clone()));

        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!(
            " BENCHMARK: {} - {} ({} iterations)",
            benchmark.name(),
            benchmark.description(),
            self.config.iterations
        );
        println!("═══════════════════════════════════════════════════════════════");

        if self.config.warmup {
            println!();
            println!(" ─── Warm-up ───────────────────────────────────────────────────");
            let warmup = generator.warmup().await?;
            println!(
                "   {} requests in {:?}, starting measured iterations...",
                warmup.total_requests, warmup.elapsed
            );
        }

        let mut metrics = Vec::with_capacity(self.config.iterations);
        for i in 0..self.config.iterations {
            println!();
            println!(
                " ─── Iteration {}/{} ─────────────────────────────────────────────",
                i + 1,
                self.config.iterations
            );

            let result = generator.run().await?;
            if result.total_requests != expected {
                return Err(LoadGenError::FatalRunError {
                    worker_id: None,
                    reason: format!(
                        "issued {} requests, expected {}",
                        result.total_requests, expected
                    ),
                });
            }

            let m = BenchmarkMetrics::from_result(&result);
            println!(
                "   Elapsed: {:.1}ms | Throughput: {:.0} req/s | Failed: {} | Block P99: {:.2}ms",
                m.elapsed_ms,
                m.throughput,
                m.failed_requests,
                m.block_p99_ms.unwrap_or(0.0)
            );
            metrics.push(m);
        }

        let report = BenchmarkReport::from_metrics(benchmark, self.config.warmup, &metrics);
        let baseline = match BaselineFile::open(&self.config.baseline_path) {
            Ok(file) => file.get(benchmark.name()).cloned(),
            Err(e) => {
                warn!(path = ?self.config.baseline_path, "Ignoring unreadable baseline: {}", e);
                None
            }
        };
        let comparisons = self.compare(&report, baseline.as_ref());
        self.print_comparison(&report, baseline.as_ref(), &comparisons);

        let has_regression = comparisons.iter().any(Comparison::is_regression);
        info!(
            benchmark = benchmark.name(),
            throughput = report.throughput.mean,
            has_regression,
            "Benchmark complete"
        );

        Ok(BenchmarkResult {
            report,
            comparisons,
            has_regression,
        })
    }

    fn compare(&self, report: &BenchmarkReport, baseline: Option<&Baseline>) -> Vec<Comparison> {
        let threshold = self.config.regression_threshold_pct;

        Metric::ALL
            .into_iter()
            .map(|metric| {
                Comparison::of(
                    metric,
                    report.value_of(metric),
                    baseline.and_then(|b| metric.stored(b)),
                    threshold,
                )
            })
            .collect()
    }

    #[allow(clippy::print_literal)]
    fn print_comparison(
        &self,
        report: &BenchmarkReport,
        baseline: Option<&Baseline>,
        comparisons: &[Comparison],
    ) {
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!(
            " RESULTS: {} ({} iterations, {} requests)",
            report.benchmark.name(),
            report.iterations,
            report.total_requests
        );
        println!("═══════════════════════════════════════════════════════════════");
        println!();

        if baseline.is_some() {
            println!(" ─── Comparison vs Baseline ──────────────────────────────────");
            println!();
            println!(
                "   {:12} {:>14}   {:>14}   {}",
                "Metric", "Current", "Baseline", "Change"
            );
            println!(
                "   {:12} {:>14}   {:>14}   {}",
                "──────", "───────", "────────", "──────"
            );

            for c in comparisons.iter().filter(|c| c.has_values()) {
                println!(
                    "   {:12} {:>14}   {:>14}   {}",
                    c.metric.label(),
                    c.current_text(),
                    c.baseline_text(),
                    c.change_text()
                );
            }
        } else {
            println!(" ─── Results (no baseline) ───────────────────────────────────");
            println!();
            println!("   Elapsed:      {}", report.elapsed.format("ms"));
            println!("   Throughput:   {}", report.throughput.format(" req/s"));
            if let Some(ref stats) = report.block_p99 {
                println!("   Block P99:    {}", stats.format("ms"));
            }
            println!("   Error Rate:   {}", report.error_rate.format("%"));
            println!();
            println!("   (Set LOADGEN_SAVE_BASELINE=1 to store a baseline)");
        }

        println!();
        println!("═══════════════════════════════════════════════════════════════");
        let overall = if comparisons.iter().any(Comparison::is_regression) {
            "FAIL (regression detected)"
        } else {
            "PASS"
        };
        println!(" OVERALL: {}", overall);
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }

    /// Save current results as the new baseline
    pub fn save_baseline(&self, report: &BenchmarkReport) -> std::io::Result<()> {
        let path = &self.config.baseline_path;
        let mut file = BaselineFile::open(path)?;
        file.record(report.to_baseline());
        file.persist(path)?;
        info!(
            "Baseline saved to {:?} for {}",
            self.config.baseline_path,
            report.benchmark.name()
        );
        Ok(())
    }
}

/// Full benchmark result
pub struct BenchmarkResult {
    pub report: BenchmarkReport,
    pub comparisons: Vec<Comparison>,
    pub has_regression: bool,
}

impl BenchmarkResult {
    pub fn passed(&self) -> bool {
        !self.has_regression
    }

    /// JSON summary for CI
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "passed": self.passed(),
            "benchmark": self.report.benchmark.name(),
            "iterations": self.report.iterations,
            "warmup": self.report.warmup,
            "total_requests": self.report.total_requests,
            "throughput": self.report.throughput.mean,
            "error_rate_pct": self.report.error_rate.mean,
            "block_p99_ms": self.report.block_p99.as_ref().map(|s| s.mean),
            "has_regression": self.has_regression,
        })
        .to_string()
    }
}

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use ping_loadgen::bench::{BenchmarkRunConfig, BenchmarkRunner, PingBenchmark};
use ping_loadgen::config::Config;
use ping_loadgen::ping::{HostConfig, HostSet};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the Prometheus metrics recorder
fn setup_prometheus_metrics() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Must be installed before any metrics are recorded
    let prometheus_handle = setup_prometheus_metrics()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ping_loadgen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Loaded configuration: benchmark={:?}, iterations={}, warmup={}",
        config.benchmark, config.iterations, config.warmup
    );

    let mut hosts = HostSet::new();
    let host = hosts.start(HostConfig {
        name: "local".to_string(),
        latency: config.ping.latency,
        failure_rate: config.ping.failure_rate,
    });

    let mut failed = Vec::new();
    for benchmark in PingBenchmark::selected(config.benchmark) {
        let runner = BenchmarkRunner::new(BenchmarkRunConfig::new(benchmark, &config));
        match runner.run(&host).await {
            Ok(result) => {
                println!("JSON: {}", result.to_json());
                if config.baseline.save
                    && let Err(e) = runner.save_baseline(&result.report)
                {
                    warn!("Failed to save baseline for {}: {}", benchmark.name(), e);
                }
                if !result.passed() {
                    failed.push(benchmark.name());
                }
            }
            Err(e) => {
                error!("Benchmark {} aborted: {}", benchmark.name(), e);
                failed.push(benchmark.name());
            }
        }
    }

    hosts.shutdown();

    if config.print_metrics {
        println!("{}", prometheus_handle.render());
    }

    if !failed.is_empty() {
        anyhow::bail!("benchmarks failed: {}", failed.join(", "));
    }
    Ok(())
}

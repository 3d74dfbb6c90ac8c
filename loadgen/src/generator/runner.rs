//! Bounded-concurrency load generator
//!
//! A run spawns exactly `max_concurrency` worker tasks. Each worker executes
//! its blocks strictly in order and every block waits for all of its requests,
//! so at most `max_concurrency * requests_per_block` requests are ever in
//! flight. All workers are joined (or aborted and drained) before a run
//! returns.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use metrics::{counter, gauge, histogram};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace};

use super::target::{FnTargetSource, TargetSource};
use super::types::{
    LatencyStats, LoadGenError, RequestError, RunConfiguration, RunResult, StateRefresh,
};

/// Drives the configured workload against a [`TargetSource`]
pub struct ConcurrentLoadGenerator<S: TargetSource> {
    config: RunConfiguration,
    source: Arc<S>,
}

impl<S: TargetSource> ConcurrentLoadGenerator<S> {
    pub fn new(config: RunConfiguration, source: S) -> Self {
        Self::with_shared_source(config, Arc::new(source))
    }

    pub fn with_shared_source(config: RunConfiguration, source: Arc<S>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    /// Execute the full workload once
    pub async fn run(&self) -> Result<RunResult, LoadGenError> {
        self.execute("run", self.config.blocks_per_worker()).await
    }

    /// Execute a single block per worker. Primes target activations before
    /// measured runs.
    pub async fn warmup(&self) -> Result<RunResult, LoadGenError> {
        self.execute("warmup", 1).await
    }

    async fn execute(
        &self,
        phase: &'static str,
        blocks_per_worker: usize,
    ) -> Result<RunResult, LoadGenError> {
        let config = &self.config;
        let concurrent = config.dispatch.is_concurrent(config.max_concurrency());
        info!(
            phase,
            workers = config.max_concurrency(),
            blocks_per_worker,
            requests_per_block = config.requests_per_block(),
            concurrent_blocks = concurrent,
            "Starting load run"
        );

        let start = Instant::now();
        let mut workers = JoinSet::new();
        for worker_id in 0..config.max_concurrency() {
            let worker = Worker {
                id: worker_id,
                source: self.source.clone(),
                blocks: blocks_per_worker,
                requests_per_block: config.requests_per_block(),
                state_refresh: config.state_refresh,
                concurrent,
                log_blocks: config.log_intermediate_results,
            };
            workers.spawn(worker.run());
        }

        let mut total_requests = 0u64;
        let mut failed_requests = 0u64;
        let mut block_latencies = LatencyStats::new();

        while let Some(joined) = workers.join_next().await {
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    error!(phase, "Aborting load run: {}", e);
                    abort_and_drain(&mut workers).await;
                    return Err(e);
                }
                Err(join_error) => {
                    error!(phase, "Worker task failed: {}", join_error);
                    abort_and_drain(&mut workers).await;
                    return Err(LoadGenError::FatalRunError {
                        worker_id: None,
                        reason: join_error.to_string(),
                    });
                }
            };
            total_requests += outcome.issued;
            failed_requests += outcome.failed;
            block_latencies.merge(outcome.block_latencies);
        }

        let result = RunResult {
            elapsed: start.elapsed(),
            total_requests,
            failed_requests,
            block_latencies,
        };

        counter!("loadgen_runs_total", "phase" => phase).increment(1);
        counter!("loadgen_requests_total").increment(result.total_requests);
        counter!("loadgen_request_failures_total").increment(result.failed_requests);
        histogram!("loadgen_run_duration_seconds").record(result.elapsed.as_secs_f64());
        gauge!("loadgen_run_throughput").set(result.throughput());

        info!(
            phase,
            total = result.total_requests,
            failed = result.failed_requests,
            elapsed = ?result.elapsed,
            "Load run complete: {:.0} req/s",
            result.throughput()
        );
        Ok(result)
    }
}

impl<T, R, I, Fut> ConcurrentLoadGenerator<FnTargetSource<R, I>>
where
    T: Clone + Send + Sync + 'static,
    R: Fn(usize) -> T + Send + Sync + 'static,
    I: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RequestError>> + Send + 'static,
{
    /// Build a generator from a request closure and a per-worker target
    /// factory.
    pub fn from_fns(
        max_concurrency: usize,
        blocks_per_worker: usize,
        requests_per_block: usize,
        issue_request: I,
        get_state_for_worker: R,
        state_refresh: StateRefresh,
    ) -> Result<Self, LoadGenError> {
        let config = RunConfiguration::new(max_concurrency, blocks_per_worker, requests_per_block)?
            .with_state_refresh(state_refresh);
        Ok(Self::new(
            config,
            FnTargetSource::new(get_state_for_worker, issue_request),
        ))
    }
}

async fn abort_and_drain<T: 'static>(workers: &mut JoinSet<T>) {
    workers.abort_all();
    while workers.join_next().await.is_some() {}
}

#[derive(Default)]
struct WorkerOutcome {
    issued: u64,
    failed: u64,
    block_latencies: LatencyStats,
}

struct Worker<S: TargetSource> {
    id: usize,
    source: Arc<S>,
    blocks: usize,
    requests_per_block: usize,
    state_refresh: StateRefresh,
    concurrent: bool,
    log_blocks: bool,
}

impl<S: TargetSource> Worker<S> {
    async fn run(self) -> Result<WorkerOutcome, LoadGenError> {
        let mut outcome = WorkerOutcome::default();
        let reused = match self.state_refresh {
            StateRefresh::Worker => Some(self.resolve().await?),
            StateRefresh::Block => None,
        };

        for block in 0..self.blocks {
            let fresh;
            let target = match &reused {
                Some(target) => target,
                None => {
                    fresh = self.resolve().await?;
                    &fresh
                }
            };

            let block_start = Instant::now();
            let failed = self.run_block(target).await;
            let block_elapsed = block_start.elapsed();

            histogram!("loadgen_block_duration_seconds").record(block_elapsed.as_secs_f64());
            outcome.issued += self.requests_per_block as u64;
            outcome.failed += failed;
            outcome.block_latencies.record(block_elapsed);

            if self.log_blocks {
                let throughput =
                    self.requests_per_block as f64 / block_elapsed.as_secs_f64().max(1e-9);
                info!(
                    worker_id = self.id,
                    block,
                    failed,
                    "Block complete in {:?} ({:.0} req/s)",
                    block_elapsed,
                    throughput
                );
            } else {
                debug!(worker_id = self.id, block, failed, "Block complete in {:?}", block_elapsed);
            }
        }

        Ok(outcome)
    }

    async fn resolve(&self) -> Result<S::Target, LoadGenError> {
        self.source
            .resolve_target(self.id)
            .await
            .map_err(|e| LoadGenError::FatalRunError {
                worker_id: Some(self.id),
                reason: e.to_string(),
            })
    }

    /// Issue one block of requests and return how many failed
    async fn run_block(&self, target: &S::Target) -> u64 {
        let source = &*self.source;
        let mut failed = 0;

        if self.concurrent {
            let mut in_flight: FuturesUnordered<_> = (0..self.requests_per_block)
                .map(|_| source.issue_request(target))
                .collect();
            while let Some(result) = in_flight.next().await {
                if let Err(e) = result {
                    trace!(worker_id = self.id, "{}", e);
                    failed += 1;
                }
            }
        } else {
            for _ in 0..self.requests_per_block {
                if let Err(e) = source.issue_request(target).await {
                    trace!(worker_id = self.id, "{}", e);
                    failed += 1;
                }
            }
        }

        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::types::{BlockDispatch, TargetError};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records every call and tracks peak request overlap
    #[derive(Default)]
    struct CountingSource {
        resolves: AtomicUsize,
        requests: AtomicU64,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        workers_seen: Mutex<HashSet<usize>>,
        fail_requests: bool,
        fail_worker: Option<usize>,
        panic_worker: Option<usize>,
        request_delay: Option<Duration>,
    }

    #[async_trait]
    impl TargetSource for CountingSource {
        type Target = usize;

        async fn resolve_target(&self, worker_id: usize) -> Result<usize, TargetError> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            self.workers_seen.lock().unwrap().insert(worker_id);
            if self.fail_worker == Some(worker_id) {
                return Err(TargetError(format!("no target for {}", worker_id)));
            }
            Ok(worker_id)
        }

        async fn issue_request(&self, target: &usize) -> Result<(), RequestError> {
            if self.panic_worker == Some(*target) {
                panic!("worker {} blew up", target);
            }
            self.requests.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            match self.request_delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_requests {
                Err(RequestError("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn generator(
        config: RunConfiguration,
        source: CountingSource,
    ) -> (ConcurrentLoadGenerator<CountingSource>, Arc<CountingSource>) {
        let source = Arc::new(source);
        (
            ConcurrentLoadGenerator::with_shared_source(config, source.clone()),
            source,
        )
    }

    #[tokio::test]
    async fn test_issues_exact_total() {
        let config = RunConfiguration::new(5, 3, 7).unwrap();
        let (generator, source) = generator(config, CountingSource::default());

        let result = generator.run().await.unwrap();
        assert_eq!(result.total_requests, 105);
        assert_eq!(result.failed_requests, 0);
        assert_eq!(source.requests.load(Ordering::SeqCst), 105);
        assert_eq!(result.block_latencies.len(), 15);
    }

    #[tokio::test]
    async fn test_worker_ids_cover_range() {
        let config = RunConfiguration::new(8, 1, 1).unwrap();
        let (generator, source) = generator(config, CountingSource::default());

        generator.run().await.unwrap();
        let seen = source.workers_seen.lock().unwrap().clone();
        assert_eq!(seen, (0..8).collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn test_state_resolved_once_per_worker() {
        let config = RunConfiguration::new(4, 6, 2).unwrap();
        let (generator, source) = generator(config, CountingSource::default());

        generator.run().await.unwrap();
        assert_eq!(source.resolves.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_state_resolved_once_per_block() {
        let config = RunConfiguration::new(4, 6, 2)
            .unwrap()
            .with_state_refresh(StateRefresh::Block);
        let (generator, source) = generator(config, CountingSource::default());

        generator.run().await.unwrap();
        assert_eq!(source.resolves.load(Ordering::SeqCst), 24);
    }

    #[tokio::test]
    async fn test_single_worker_is_sequential() {
        let config = RunConfiguration::new(1, 1, 500).unwrap();
        let (generator, source) = generator(config, CountingSource::default());

        let result = generator.run().await.unwrap();
        assert_eq!(result.total_requests, 500);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(source.resolves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_in_flight_bounded_by_block_size() {
        let config = RunConfiguration::new(4, 1, 8).unwrap();
        let source = CountingSource {
            request_delay: Some(Duration::from_millis(10)),
            ..Default::default()
        };
        let (generator, source) = generator(config, source);

        generator.run().await.unwrap();
        let peak = source.max_in_flight.load(Ordering::SeqCst);
        assert!(peak > 1, "requests within a block should overlap");
        assert!(peak <= 32, "peak {} exceeds bound", peak);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sequential_dispatch_bounds_by_workers() {
        let config = RunConfiguration::new(3, 2, 10)
            .unwrap()
            .with_dispatch(BlockDispatch::Sequential);
        let source = CountingSource {
            request_delay: Some(Duration::from_millis(1)),
            ..Default::default()
        };
        let (generator, source) = generator(config, source);

        let result = generator.run().await.unwrap();
        assert_eq!(result.total_requests, 60);
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_all_failures_still_complete() {
        let config = RunConfiguration::new(3, 2, 5).unwrap();
        let source = CountingSource {
            fail_requests: true,
            ..Default::default()
        };
        let (generator, _) = generator(config, source);

        let result = generator.run().await.unwrap();
        assert_eq!(result.total_requests, 30);
        assert_eq!(result.failed_requests, 30);
        assert_eq!(result.error_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_resolve_failure_is_fatal() {
        let config = RunConfiguration::new(4, 2, 2).unwrap();
        let source = CountingSource {
            fail_worker: Some(2),
            ..Default::default()
        };
        let (generator, _) = generator(config, source);

        let err = generator.run().await.unwrap_err();
        match err {
            LoadGenError::FatalRunError { worker_id, .. } => assert_eq!(worker_id, Some(2)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_panic_is_fatal_and_stops_others() {
        let config = RunConfiguration::new(4, 50, 2).unwrap();
        let source = CountingSource {
            panic_worker: Some(1),
            request_delay: Some(Duration::from_millis(2)),
            ..Default::default()
        };
        let (generator, source) = generator(config, source);

        let err = generator.run().await.unwrap_err();
        assert!(matches!(
            err,
            LoadGenError::FatalRunError {
                worker_id: None,
                ..
            }
        ));

        let issued = source.requests.load(Ordering::SeqCst);
        assert!(issued < 400, "surviving workers ran to completion");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.requests.load(Ordering::SeqCst), issued);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_independent() {
        let config = RunConfiguration::new(2, 3, 4).unwrap();
        let (generator, source) = generator(config, CountingSource::default());

        let first = generator.run().await.unwrap();
        let second = generator.run().await.unwrap();
        assert_eq!(first.total_requests, 24);
        assert_eq!(second.total_requests, 24);
        assert_eq!(source.requests.load(Ordering::SeqCst), 48);
    }

    #[tokio::test]
    async fn test_warmup_runs_one_block_per_worker() {
        let config = RunConfiguration::new(3, 10, 4).unwrap();
        let (generator, _) = generator(config, CountingSource::default());

        let result = generator.warmup().await.unwrap();
        assert_eq!(result.total_requests, 12);
        assert_eq!(result.block_latencies.len(), 3);
    }

    #[tokio::test]
    async fn test_from_fns() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let generator = ConcurrentLoadGenerator::from_fns(
            2,
            2,
            5,
            move |_target: usize| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |worker_id| worker_id,
            StateRefresh::Worker,
        )
        .unwrap();

        let result = generator.run().await.unwrap();
        assert_eq!(result.total_requests, 20);
        assert_eq!(calls.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_from_fns_rejects_zero() {
        let result = ConcurrentLoadGenerator::from_fns(
            0,
            1,
            1,
            |_target: usize| async { Ok(()) },
            |worker_id| worker_id,
            StateRefresh::Worker,
        );
        assert!(matches!(
            result,
            Err(LoadGenError::InvalidConfiguration(_))
        ));
    }
}

//! In-process ping host
//!
//! Hosts a directory of ping activations keyed by target id. Targets are
//! activated on first use and deactivated when the host stops. Latency and
//! failure injection let benchmarks model slower or unreliable targets.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::counter;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by ping targets
#[derive(Debug, Error)]
pub enum PingError {
    #[error("Host {0} is stopped")]
    HostStopped(String),

    #[error("Injected failure on target {0}")]
    InjectedFailure(u64),
}

/// Ping host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Name used in logs and errors
    pub name: String,
    /// Simulated latency added to every ping
    pub latency: Duration,
    /// Probability (0.0-1.0) that a ping fails
    pub failure_rate: f64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            latency: Duration::ZERO,
            failure_rate: 0.0,
        }
    }
}

#[derive(Debug)]
struct Activation {
    pings: AtomicU64,
    activated_at: Instant,
}

#[derive(Debug)]
struct HostInner {
    config: HostConfig,
    activations: DashMap<u64, Arc<Activation>>,
    running: AtomicBool,
}

/// Handle to a running ping host. Clones share the same host.
#[derive(Clone, Debug)]
pub struct PingHost {
    inner: Arc<HostInner>,
}

impl PingHost {
    pub fn start(mut config: HostConfig) -> Self {
        config.failure_rate = config.failure_rate.clamp(0.0, 1.0);
        info!(
            "Started ping host {} (latency={:?}, failure_rate={})",
            config.name, config.latency, config.failure_rate
        );
        Self {
            inner: Arc::new(HostInner {
                config,
                activations: DashMap::new(),
                running: AtomicBool::new(true),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Get a handle to the target with the given id. Does not activate it.
    pub fn target(&self, id: u64) -> PingTarget {
        PingTarget {
            id,
            host: self.clone(),
        }
    }

    /// Number of currently active targets
    pub fn activation_count(&self) -> usize {
        self.inner.activations.len()
    }

    /// Successful pings handled by one target, if it is active
    pub fn ping_count(&self, id: u64) -> Option<u64> {
        self.inner
            .activations
            .get(&id)
            .map(|a| a.pings.load(Ordering::Relaxed))
    }

    /// Successful pings handled across all active targets
    pub fn total_pings(&self) -> u64 {
        self.inner
            .activations
            .iter()
            .map(|a| a.pings.load(Ordering::Relaxed))
            .sum()
    }

    /// Stop accepting pings and deactivate all targets
    pub fn stop(&self) {
        if self.inner.running.swap(false, Ordering::AcqRel) {
            let deactivated = self.inner.activations.len();
            self.inner.activations.clear();
            info!(
                "Stopped ping host {} ({} activations released)",
                self.name(),
                deactivated
            );
        }
    }

    pub fn ensure_running(&self) -> Result<(), PingError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(PingError::HostStopped(self.name().to_string()))
        }
    }

    /// Look up or create the activation for `id`. The running flag is read
    /// under the shard lock, so `stop` cannot miss a concurrent insert.
    fn activate(&self, id: u64) -> Result<Arc<Activation>, PingError> {
        self.ensure_running()?;
        if let Some(existing) = self.inner.activations.get(&id) {
            return Ok(existing.clone());
        }

        match self.inner.activations.entry(id) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                self.ensure_running()?;
                counter!("loadgen_ping_activations_total").increment(1);
                debug!(target_id = id, "Activating ping target");
                let activation = Arc::new(Activation {
                    pings: AtomicU64::new(0),
                    activated_at: Instant::now(),
                });
                entry.insert(activation.clone());
                Ok(activation)
            }
        }
    }

    /// Age of an activation, if the target is active
    pub fn activation_age(&self, id: u64) -> Option<Duration> {
        self.inner
            .activations
            .get(&id)
            .map(|a| a.activated_at.elapsed())
    }
}

/// Addressable ping target
#[derive(Clone, Debug)]
pub struct PingTarget {
    id: u64,
    host: PingHost,
}

impl PingTarget {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Handle one ping
    pub async fn ping(&self) -> Result<(), PingError> {
        let host = &self.host;
        let activation = host.activate(self.id)?;
        let config = &host.inner.config;

        if !config.latency.is_zero() {
            tokio::time::sleep(config.latency).await;
        }
        if config.failure_rate > 0.0 && rand::rng().random_bool(config.failure_rate) {
            return Err(PingError::InjectedFailure(self.id));
        }

        activation.pings.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Hosts started by a benchmark, owned by the caller
#[derive(Default)]
pub struct HostSet {
    hosts: Vec<PingHost>,
}

impl HostSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a host and keep it in the set
    pub fn start(&mut self, config: HostConfig) -> PingHost {
        let host = PingHost::start(config);
        self.hosts.push(host.clone());
        host
    }

    /// First host started
    pub fn primary(&self) -> Option<&PingHost> {
        self.hosts.first()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Stop every host, most recently started first
    pub fn shutdown(mut self) {
        self.hosts.reverse();
        for host in self.hosts.drain(..) {
            host.stop();
        }
    }
}

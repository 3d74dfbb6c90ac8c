//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use async_trait::async_trait;
use ping_loadgen::generator::{RequestError, TargetError, TargetSource};
use ping_loadgen::{HostConfig, PingHost};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Start a ping host with no latency or failures
pub fn start_test_host() -> PingHost {
    PingHost::start(HostConfig {
        name: format!("test-host-{}", &uuid::Uuid::new_v4().to_string()[..8]),
        ..Default::default()
    })
}

/// Start a ping host that adds latency to every ping
pub fn start_slow_host(latency: Duration) -> PingHost {
    PingHost::start(HostConfig {
        name: "slow-host".to_string(),
        latency,
        ..Default::default()
    })
}

/// Target source that records which target each request hit and the
/// peak number of overlapping requests
#[derive(Default)]
pub struct RecordingSource {
    pub resolved: Mutex<Vec<usize>>,
    pub requests_per_target: Mutex<HashMap<u64, u64>>,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub next_target: AtomicUsize,
    pub delay: Duration,
}

impl RecordingSource {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn target_counts(&self) -> HashMap<u64, u64> {
        self.requests_per_target.lock().unwrap().clone()
    }
}

#[async_trait]
impl TargetSource for RecordingSource {
    type Target = u64;

    async fn resolve_target(&self, worker_id: usize) -> Result<u64, TargetError> {
        self.resolved.lock().unwrap().push(worker_id);
        Ok(self.next_target.fetch_add(1, Ordering::SeqCst) as u64)
    }

    async fn issue_request(&self, target: &u64) -> Result<(), RequestError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        *self
            .requests_per_target
            .lock()
            .unwrap()
            .entry(*target)
            .or_insert(0) += 1;
        Ok(())
    }
}

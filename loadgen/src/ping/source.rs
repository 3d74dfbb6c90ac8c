//! Target source that drives the load generator against a ping host

use async_trait::async_trait;
use uuid::Uuid;

use super::host::{PingError, PingHost, PingTarget};
use crate::generator::{RequestError, TargetError, TargetSource};

impl From<PingError> for RequestError {
    fn from(e: PingError) -> Self {
        RequestError(e.to_string())
    }
}

impl From<PingError> for TargetError {
    fn from(e: PingError) -> Self {
        TargetError(e.to_string())
    }
}

/// Resolves every worker to a fresh, randomly addressed ping target
pub struct PingSource {
    host: PingHost,
}

impl PingSource {
    pub fn new(host: PingHost) -> Self {
        Self { host }
    }
}

#[async_trait]
impl TargetSource for PingSource {
    type Target = PingTarget;

    async fn resolve_target(&self, _worker_id: usize) -> Result<PingTarget, TargetError> {
        self.host.ensure_running()?;
        let (id, _) = Uuid::new_v4().as_u64_pair();
        Ok(self.host.target(id))
    }

    async fn issue_request(&self, target: &PingTarget) -> Result<(), RequestError> {
        Ok(target.ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ping::HostConfig;

    #[tokio::test]
    async fn test_workers_get_distinct_targets() {
        let host = PingHost::start(HostConfig::default());
        let source = PingSource::new(host.clone());

        let a = source.resolve_target(0).await.unwrap();
        let b = source.resolve_target(0).await.unwrap();
        assert_ne!(a.id(), b.id());

        source.issue_request(&a).await.unwrap();
        assert_eq!(host.ping_count(a.id()), Some(1));
    }

    #[tokio::test]
    async fn test_stopped_host_fails_resolution() {
        let host = PingHost::start(HostConfig {
            name: "gone".to_string(),
            ..Default::default()
        });
        let source = PingSource::new(host.clone());
        host.stop();

        let err = source.resolve_target(0).await.unwrap_err();
        assert_eq!(err.0, "Host gone is stopped");
    }

    #[tokio::test]
    async fn test_ping_errors_keep_their_message() {
        let host = PingHost::start(HostConfig {
            failure_rate: 1.0,
            ..Default::default()
        });
        let source = PingSource::new(host.clone());
        let target = host.target(42);

        let err = source.issue_request(&target).await.unwrap_err();
        assert_eq!(err.0, "Injected failure on target 42");

        host.stop();
        let err = source.issue_request(&target).await.unwrap_err();
        assert_eq!(err.to_string(), "Request failed: Host local is stopped");
    }
}

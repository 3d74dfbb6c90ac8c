//! TargetSource trait definition

use async_trait::async_trait;
use std::future::Future;

use super::types::{RequestError, TargetError};

/// Capability the load generator drives: hands out one target per worker
/// and issues requests against it.
///
/// Both methods are called concurrently from different workers.
#[async_trait]
pub trait TargetSource: Send + Sync + 'static {
    /// Handle a worker issues its requests against
    type Target: Send + Sync + 'static;

    /// Obtain the target for a worker. An error here aborts the run.
    async fn resolve_target(&self, worker_id: usize) -> Result<Self::Target, TargetError>;

    /// Issue one request. An error here is counted and the run continues.
    async fn issue_request(&self, target: &Self::Target) -> Result<(), RequestError>;
}

/// Adapts a pair of closures to [`TargetSource`]
pub struct FnTargetSource<R, I> {
    resolve: R,
    issue: I,
}

impl<R, I> FnTargetSource<R, I> {
    pub fn new(get_state_for_worker: R, issue_request: I) -> Self {
        Self {
            resolve: get_state_for_worker,
            issue: issue_request,
        }
    }
}

#[async_trait]
impl<T, R, I, Fut> TargetSource for FnTargetSource<R, I>
where
    T: Clone + Send + Sync + 'static,
    R: Fn(usize) -> T + Send + Sync + 'static,
    I: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RequestError>> + Send + 'static,
{
    type Target = T;

    async fn resolve_target(&self, worker_id: usize) -> Result<T, TargetError> {
        Ok((self.resolve)(worker_id))
    }

    async fn issue_request(&self, target: &T) -> Result<(), RequestError> {
        (self.issue)(target.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_source_passes_worker_id() {
        let source = FnTargetSource::new(
            |worker_id: usize| worker_id * 10,
            |target: usize| async move {
                if target == 0 {
                    Err(RequestError("zero".to_string()))
                } else {
                    Ok(())
                }
            },
        );

        assert_eq!(source.resolve_target(3).await.unwrap(), 30);
        assert!(source.issue_request(&30).await.is_ok());
        assert!(source.issue_request(&0).await.is_err());
    }
}

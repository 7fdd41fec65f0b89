//! Request-scoped context threaded through every session store call.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{StoreError, StoreResult};

/// Identity and deadline of the HTTP request a store call belongs to.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    deadline: Instant,
    timeout: Duration,
}

impl RequestContext {
    /// Context for a request starting now with `timeout` to spend on the store.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().simple().to_string(),
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Time left before the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Run a store operation, failing it once the deadline passes.
    pub async fn run<T, F>(&self, operation: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        tokio::time::timeout_at(self.deadline, operation)
            .await
            .map_err(|_| StoreError::DeadlineExceeded(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_within_deadline() {
        let ctx = RequestContext::new(Duration::from_secs(1));
        let value = ctx.run(async { Ok::<_, StoreError>(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(ctx.remaining() <= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_past_deadline() {
        let ctx = RequestContext::new(Duration::from_millis(50));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::DeadlineExceeded(_))));
    }

    #[test]
    fn test_request_ids_unique() {
        let a = RequestContext::new(Duration::from_secs(1));
        let b = RequestContext::new(Duration::from_secs(1));
        assert_ne!(a.request_id(), b.request_id());
    }
}

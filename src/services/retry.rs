//! Retry policy for transient tool failures.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::domain::errors::DomainResult;

/// Result of a retried operation and whether a retry happened.
#[derive(Debug)]
pub struct Attempt<T> {
    pub result: DomainResult<T>,
    pub retried: bool,
}

/// Retries an operation only while it fails with a transient error.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    max_retries: u32,
    /// Fixed delay between attempts
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff: Duration::from_millis(backoff_ms),
        }
    }

    /// A single retry after `backoff_ms`.
    pub fn once(backoff_ms: u64) -> Self {
        Self::new(1, backoff_ms)
    }

    /// Execute `operation`, retrying transient failures.
    ///
    /// Validation, not-found and other permanent errors return immediately.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Attempt<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let mut retries = 0;
        loop {
            match operation().await {
                Err(err) if err.is_transient() && retries < self.max_retries => {
                    retries += 1;
                    warn!(error = %err, attempt = retries, "transient failure, retrying");
                    sleep(self.backoff).await;
                }
                result => {
                    return Attempt {
                        result,
                        retried: retries > 0,
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let calls = &AtomicU32::new(0);
        let attempt = RetryPolicy::once(1)
            .execute(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(DomainError::Transient("busy".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(attempt.result.unwrap(), 7);
        assert!(attempt.retried);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_one_retry() {
        let calls = &AtomicU32::new(0);
        let attempt: Attempt<()> = RetryPolicy::once(1)
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::Transient("busy".into()))
            })
            .await;

        assert!(attempt.result.unwrap_err().is_transient());
        assert!(attempt.retried);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let attempt: Attempt<()> = RetryPolicy::once(1)
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::TaskNotFound(3))
            })
            .await;

        assert!(matches!(attempt.result, Err(DomainError::TaskNotFound(3))));
        assert!(!attempt.retried);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

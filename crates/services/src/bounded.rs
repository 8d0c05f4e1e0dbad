//! Bounded calls into ports: every lookup gets a timeout and at most one retry.

use std::future::Future;
use std::time::Duration;

use domains::{AppError, Result, StoreError, StoreResult};
use tracing::warn;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl FetchPolicy {
    pub fn new(timeout: Duration) -> Self {
        FetchPolicy { timeout }
    }

    /// Runs `op` under the timeout. A timeout or [`StoreError::Unavailable`]
    /// is retried once, immediately; a second failure becomes
    /// [`AppError::Unavailable`]. Any other error is returned as is.
    pub async fn fetch<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut last_failure = String::new();
        for attempt in 1..=2u8 {
            match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(StoreError::Unavailable(msg))) => {
                    warn!(what, attempt, error = %msg, "lookup failed");
                    last_failure = msg;
                }
                Ok(Err(other)) => return Err(other.into()),
                Err(_) => {
                    let timeout_ms = self.timeout.as_millis() as u64;
                    warn!(what, attempt, timeout_ms, "lookup timed out");
                    last_failure = format!("timed out after {:?}", self.timeout);
                }
            }
        }
        Err(AppError::Unavailable(format!("{what}: {last_failure}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = FetchPolicy::new(Duration::from_millis(50));
        let value = policy
            .fetch("post", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(StoreError::Unavailable("connection reset".into()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_timeout() {
        let calls = AtomicU32::new(0);
        let policy = FetchPolicy::new(Duration::from_millis(10));
        let result: Result<()> = policy
            .fetch("post", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;
        assert!(matches!(result, Err(AppError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backend_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = FetchPolicy::default();
        let result: Result<()> = tokio_test::block_on(policy.fetch("post", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Backend(anyhow::anyhow!("corrupt row"))) }
        }));
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

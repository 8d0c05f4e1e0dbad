//! Optimistic updates with rollback.
//!
//! The local view flips as soon as a mutation is attempted. If the call to
//! the API fails the previous value is restored and the error is returned
//! to the caller to surface.

use std::future::Future;

use tokio::sync::watch;
use tracing::warn;

use crate::error::ClientError;

/// Locally displayed value of a server-side toggle, such as "following" or
/// "saved to this box".
pub struct OptimisticToggle<T> {
    view: watch::Sender<T>,
}

impl<T: Clone + PartialEq> OptimisticToggle<T> {
    pub fn new(initial: T) -> Self {
        let (view, _) = watch::channel(initial);
        Self { view }
    }

    pub fn current(&self) -> T {
        self.view.borrow().clone()
    }

    /// Observes the local view, including the optimistic value while a
    /// mutation is in flight.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.view.subscribe()
    }

    /// Shows `next` immediately, then runs `commit`. On failure the view goes
    /// back to whatever it showed before.
    pub async fn apply<F, Fut, R>(&self, next: T, commit: F) -> Result<R, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, ClientError>>,
    {
        let previous = self.view.send_replace(next);
        match commit().await {
            Ok(result) => Ok(result),
            Err(err) => {
                warn!(error = %err, "optimistic update rolled back");
                self.view.send_replace(previous);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn view_flips_before_commit_completes() {
        let toggle = OptimisticToggle::new(false);
        let watcher = toggle.subscribe();
        let seen = toggle
            .apply(true, || async move { Ok::<_, ClientError>(*watcher.borrow()) })
            .await
            .unwrap();
        assert!(seen);
        assert!(toggle.current());
    }

    #[tokio::test]
    async fn failure_restores_previous_value() {
        let toggle = OptimisticToggle::new(true);
        let err = toggle
            .apply(false, || async { Err::<(), _>(ClientError::Timeout) })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
        assert!(toggle.current());
    }
}

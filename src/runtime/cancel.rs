//! Cancellation scopes shared by groups of tasks.

use tokio::sync::watch;

/// Owner side of a cancellation scope.
///
/// Every [`CancelToken`] handed out by the scope observes the same signal.
/// Cancelling is idempotent. Dropping the scope also counts as cancellation, so
/// a task never waits on a scope that no longer exists.
#[derive(Debug)]
pub struct CancelScope {
    tx: watch::Sender<bool>,
}

/// Observer side of a [`CancelScope`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelScope {
    /// Create a scope that is not cancelled.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A token observing this scope.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Signal every token of this scope.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Leaking the sender keeps the channel open for the token's lifetime.
        std::mem::forget(tx);
        Self { rx }
    }

    /// Returns `true` if the scope was cancelled or dropped.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until the scope is cancelled or dropped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

//! Cancellation handles for fetch, polling and submission paths.
//!
//! A [`CancelToken`] stops a loop at its next suspension point. An [`Epoch`]
//! hands out tickets so a task can tell, after every await, whether a newer
//! request has superseded it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// New, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every holder of this token
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        loop {
            // registered before the flag check so a concurrent cancel is not missed
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Ticket handed out by an [`Epoch`]
pub type Ticket = u64;

/// Monotonic request counter; only the latest ticket is current
#[derive(Debug, Clone, Default)]
pub struct Epoch {
    counter: Arc<AtomicU64>,
}

impl Epoch {
    /// New counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every outstanding ticket and return a fresh one
    pub fn advance(&self) -> Ticket {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Latest ticket
    pub fn current(&self) -> Ticket {
        self.counter.load(Ordering::SeqCst)
    }

    /// Whether `ticket` is still the latest
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.current() == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled_resolves_immediately() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn test_epoch_tickets() {
        let epoch = Epoch::new();
        let first = epoch.advance();
        assert!(epoch.is_current(first));

        let second = epoch.advance();
        assert!(!epoch.is_current(first));
        assert!(epoch.is_current(second));
    }
}

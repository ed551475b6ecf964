//! Caller-supplied cancellation for lookups.
//!
//! A [`LookupContext`] combines a cancellation signal (a `watch` channel
//! flipped to `true` by the matching [`CancelHandle`]) with an optional
//! deadline. Cloning a context is cheap; all clones observe the same signal.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Fires the cancellation signal of the contexts created alongside it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel every context derived from this handle. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cancellation signal plus optional deadline for a single lookup.
#[derive(Debug, Clone, Default)]
pub struct LookupContext {
    cancel_rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl LookupContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A cancellable context and the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancel_rx: Some(rx),
            deadline: None,
        };
        (ctx, CancelHandle { tx })
    }

    /// Attach a deadline `timeout` from now. An earlier existing deadline is
    /// kept.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// The deadline, if one is attached.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the signal has fired or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        let signalled = self
            .cancel_rx
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false);
        let expired = self
            .deadline
            .map(|d| Instant::now() >= d)
            .unwrap_or(false);
        signalled || expired
    }

    /// Resolves once the signal fires or the deadline passes. Never resolves
    /// for a background context, nor after every [`CancelHandle`] is dropped
    /// without cancelling.
    pub async fn cancelled(&self) {
        let signal = async {
            match &self.cancel_rx {
                Some(rx) => {
                    let mut rx = rx.clone();
                    let sender_gone = rx.wait_for(|cancelled| *cancelled).await.is_err();
                    if sender_gone {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = signal => {}
            _ = expiry => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_handle_fires() {
        let (ctx, handle) = LookupContext::with_cancel();
        assert!(!ctx.is_cancelled());

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };
        handle.cancel();
        waiter.await.unwrap();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = LookupContext::background().with_timeout(Duration::from_secs(5));
        assert!(!ctx.is_cancelled());
        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_deadline_wins() {
        let ctx = LookupContext::background()
            .with_timeout(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(60));
        let start = Instant::now();
        ctx.cancelled().await;
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_never_cancels() {
        let ctx = LookupContext::background();
        let outcome = tokio::time::timeout(Duration::from_secs(3600), ctx.cancelled()).await;
        assert!(outcome.is_err());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_does_not_cancel() {
        let (ctx, handle) = LookupContext::with_cancel();
        drop(handle);
        let outcome = tokio::time::timeout(Duration::from_secs(60), ctx.cancelled()).await;
        assert!(outcome.is_err());
    }
}

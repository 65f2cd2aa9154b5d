//! The injected scheduler: blocking sleep for the synchronous driver,
//! non-blocking deferred scheduling for the asynchronous one, and the
//! cancellation signal both share.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use async_trait::async_trait;

/// Raised when a backoff sleep was interrupted before it elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("retry backoff sleep was interrupted")]
pub struct Interrupted;

/// A cooperative cancellation signal shared between a retry invocation and
/// whatever external actor wants to cut it short (a thread-interrupt
/// equivalent for the sync driver, a future-cancellation equivalent for
/// the async one).
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<Mutex<bool>>,
    condvar: Arc<Condvar>,
    notify: Arc<tokio::sync::Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(false)),
            condvar: Arc::new(Condvar::new()),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Signals cancellation, waking any blocking or async sleep currently
    /// waiting on this token.
    pub fn cancel(&self) {
        *self.state.lock().unwrap() = true;
        self.condvar.notify_all();
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.lock().unwrap()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Offers the two suspension points the driver ever uses: a blocking delay
/// for synchronous mode, and a non-blocking deferred continuation for
/// asynchronous mode. Both accept a [`CancellationToken`] so the caller
/// can cut a pending backoff short.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Blocks the calling thread for `d`, or returns `Err(Interrupted)` if
    /// `token` is cancelled first.
    fn sleep_blocking(&self, d: Duration, token: &CancellationToken) -> Result<(), Interrupted>;

    /// Suspends the current async task for `d` without blocking its
    /// thread, or resolves to `Err(Interrupted)` if `token` is cancelled
    /// first.
    async fn sleep_async(&self, d: Duration, token: &CancellationToken) -> Result<(), Interrupted>;
}

/// The real default scheduler: `std::thread::sleep`-equivalent blocking
/// via a condvar wait, and `tokio::time::sleep` for the async path.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    fn sleep_blocking(&self, d: Duration, token: &CancellationToken) -> Result<(), Interrupted> {
        let guard = token.state.lock().unwrap();
        let (guard, result) = token
            .condvar
            .wait_timeout_while(guard, d, |cancelled| !*cancelled)
            .unwrap();
        if *guard && !result.timed_out() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    async fn sleep_async(&self, d: Duration, token: &CancellationToken) -> Result<(), Interrupted> {
        if token.is_cancelled() {
            return Err(Interrupted);
        }
        tokio::select! {
            _ = tokio::time::sleep(d) => Ok(()),
            _ = token.notify.notified() => Err(Interrupted),
        }
    }
}

//! The retry driver: synchronous and asynchronous entry points built
//! around the shared state machine of §4.5.3 —
//!
//! `Attempting → (Succeeded | Classifying) ; Classifying → (Aborting |
//! WaitingTermination) ; WaitingTermination → (Aborting | Backing) ;
//! Backing → (Sleeping) ; Sleeping → (Interrupted | Attempting)`.

use std::future::Future;
use std::time::Duration;

use crate::classification::ErrorClassification;
use crate::clock::{Clock, SystemClock};
use crate::error::AtmosError;
use crate::policy::RetryPolicy;
use crate::scheduler::{CancellationToken, Interrupted, Scheduler, TokioScheduler};

/// What the driver does after a non-fatal, non-terminated failure:
/// always a retry, carrying the computed backoff and whether the
/// `retrying` event should be emitted for it.
enum Outcome {
    Abort,
    Retry { backoff: Duration, emit_retrying: bool },
}

/// Classifying → Aborting/WaitingTermination → Aborting/Backing, in one
/// step: consults the classifier, then (if not fatal) the termination
/// policy, then computes backoff. Shared by both drivers so the sync and
/// async state machines can't drift apart.
fn decide<E>(policy: &RetryPolicy<E>, error: &E, attempt: u32, elapsed: Duration) -> (ErrorClassification, Outcome) {
    let classification = policy.classifier().classify(error);
    if classification == ErrorClassification::Fatal {
        return (classification, Outcome::Abort);
    }
    let next_attempt = attempt + 1;
    if policy.termination().should_stop(next_attempt, elapsed) {
        return (classification, Outcome::Abort);
    }
    let backoff = policy.backoff().next_backoff(attempt, error);
    (
        classification,
        Outcome::Retry {
            backoff,
            emit_retrying: classification != ErrorClassification::SilentlyRecoverable,
        },
    )
}

/// Runs `operation` synchronously to completion, retrying per `policy`,
/// using `clock` and `scheduler` as the injected time sources and
/// `token` as the cancellation signal for the backoff sleep.
///
/// This is the fully-injected entry point the other synchronous
/// functions below are built from; reach for it directly in tests that
/// need a fake clock/scheduler, or in production code that wants to
/// expose cancellation to its caller.
pub fn retry_with<T, E, F>(
    clock: &dyn Clock,
    scheduler: &dyn Scheduler,
    token: &CancellationToken,
    name: Option<&str>,
    policy: &RetryPolicy<E>,
    mut operation: F,
) -> Result<T, AtmosError<E>>
where
    F: FnMut() -> Result<T, E>,
{
    let start = clock.now();
    let mut attempt: u32 = 1;

    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(error) => {
                let elapsed = clock.now().duration_since(start);
                let (_classification, outcome) = decide(policy, &error, attempt, elapsed);
                match outcome {
                    Outcome::Abort => {
                        policy.monitor().aborted(name, &error, attempt);
                        return Err(AtmosError::OperationFailed(error));
                    }
                    Outcome::Retry { backoff, emit_retrying } => {
                        if emit_retrying {
                            policy.monitor().retrying(name, &error, attempt, backoff, true);
                        }
                        if let Err(Interrupted) = scheduler.sleep_blocking(backoff, token) {
                            policy.monitor().interrupted(name, &error, attempt);
                            return Err(AtmosError::from(Interrupted));
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}

/// Synchronous retry with the real clock/scheduler and an unnamed,
/// non-cancellable invocation.
pub fn retry<T, E, F>(policy: &RetryPolicy<E>, operation: F) -> Result<T, AtmosError<E>>
where
    F: FnMut() -> Result<T, E>,
{
    retry_named(None, policy, operation)
}

/// Synchronous retry with the real clock/scheduler, an invocation name
/// (surfaced in monitor events), and no external cancellation.
pub fn retry_named<T, E, F>(name: Option<&str>, policy: &RetryPolicy<E>, operation: F) -> Result<T, AtmosError<E>>
where
    F: FnMut() -> Result<T, E>,
{
    retry_with(&SystemClock, &TokioScheduler, &CancellationToken::new(), name, policy, operation)
}

/// Runs `operation` asynchronously to completion, retrying per `policy`.
/// The fully-injected async counterpart to [`retry_with`].
pub async fn retry_async_with<T, E, F, Fut>(
    clock: &dyn Clock,
    scheduler: &dyn Scheduler,
    token: &CancellationToken,
    name: Option<&str>,
    policy: &RetryPolicy<E>,
    mut operation: F,
) -> Result<T, AtmosError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = clock.now();
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let elapsed = clock.now().duration_since(start);
                let (_classification, outcome) = decide(policy, &error, attempt, elapsed);
                match outcome {
                    Outcome::Abort => {
                        policy.monitor().aborted(name, &error, attempt);
                        return Err(AtmosError::OperationFailed(error));
                    }
                    Outcome::Retry { backoff, emit_retrying } => {
                        if emit_retrying {
                            policy.monitor().retrying(name, &error, attempt, backoff, true);
                        }
                        if let Err(Interrupted) = scheduler.sleep_async(backoff, token).await {
                            policy.monitor().interrupted(name, &error, attempt);
                            return Err(AtmosError::from(Interrupted));
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}

/// Asynchronous retry with the real clock/scheduler and an unnamed,
/// non-cancellable invocation.
pub async fn retry_async<T, E, F, Fut>(policy: &RetryPolicy<E>, operation: F) -> Result<T, AtmosError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_async_named(None, policy, operation).await
}

/// Asynchronous retry with the real clock/scheduler, an invocation name,
/// and no external cancellation.
pub async fn retry_async_named<T, E, F, Fut>(
    name: Option<&str>,
    policy: &RetryPolicy<E>,
    operation: F,
) -> Result<T, AtmosError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_async_with(&SystemClock, &TokioScheduler, &CancellationToken::new(), name, policy, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::classification::{partial, ErrorClassification};
    use crate::clock::fake::FakeClock;
    use crate::monitor::EventMonitor;
    use crate::termination::TerminationPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct RuntimeError(String);
    impl std::fmt::Display for RuntimeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct IllegalArgumentError(String);
    impl std::fmt::Display for IllegalArgumentError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[derive(Debug, Default)]
    struct RecordingMonitor<E> {
        retrying: Mutex<Vec<(u32, bool)>>,
        interrupted: Mutex<Vec<u32>>,
        aborted: Mutex<Vec<u32>>,
        _marker: std::marker::PhantomData<E>,
    }

    impl<E: Send + Sync> EventMonitor<E> for RecordingMonitor<E> {
        fn retrying(&self, _name: Option<&str>, _error: &E, attempt: u32, _backoff: Duration, will_retry: bool) {
            self.retrying.lock().unwrap().push((attempt, will_retry));
        }
        fn interrupted(&self, _name: Option<&str>, _error: &E, attempt: u32) {
            self.interrupted.lock().unwrap().push(attempt);
        }
        fn aborted(&self, _name: Option<&str>, _error: &E, attempt: u32) {
            self.aborted.lock().unwrap().push(attempt);
        }
    }

    /// A scheduler that records sleep durations instead of actually
    /// waiting, so attempt-cap tests run instantly.
    #[derive(Default)]
    struct RecordingScheduler {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl Scheduler for RecordingScheduler {
        fn sleep_blocking(&self, d: Duration, _token: &CancellationToken) -> Result<(), Interrupted> {
            self.slept.lock().unwrap().push(d);
            Ok(())
        }
        async fn sleep_async(&self, d: Duration, _token: &CancellationToken) -> Result<(), Interrupted> {
            self.slept.lock().unwrap().push(d);
            Ok(())
        }
    }

    #[test]
    fn happy_path_on_third_try() {
        let policy: RetryPolicy<RuntimeError> = RetryPolicy::default();
        let monitor = Arc::new(RecordingMonitor::default());
        let policy = policy.with_monitor_arc(monitor.clone());
        let scheduler = RecordingScheduler::default();
        let clock = FakeClock::new();
        let token = CancellationToken::new();

        let calls = AtomicU32::new(0);
        let result = retry_with(&clock, &scheduler, &token, None, &policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(RuntimeError("e".into()))
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(monitor.retrying.lock().unwrap().as_slice(), &[(1, true), (2, true)]);
        assert!(monitor.aborted.lock().unwrap().is_empty());
    }

    #[test]
    fn attempt_cap_emits_one_aborted() {
        let policy: RetryPolicy<RuntimeError> = RetryPolicy::default()
            .with_termination(TerminationPolicy::limit_attempts(3))
            .with_backoff(BackoffPolicy::Constant(Duration::from_millis(10)));
        let monitor = Arc::new(RecordingMonitor::default());
        let policy = policy.with_monitor_arc(monitor.clone());
        let scheduler = RecordingScheduler::default();
        let clock = FakeClock::new();
        let token = CancellationToken::new();

        let result: Result<(), _> = retry_with(&clock, &scheduler, &token, None, &policy, || {
            Err(RuntimeError("x".into()))
        });

        assert!(result.is_err());
        assert_eq!(monitor.retrying.lock().unwrap().len(), 2);
        assert_eq!(monitor.aborted.lock().unwrap(), vec![3]);
        assert_eq!(scheduler.slept.lock().unwrap().len(), 2);
    }

    #[test]
    fn fatal_short_circuits_with_exact_error() {
        let policy: RetryPolicy<IllegalArgumentError> = RetryPolicy::default()
            .with_termination(TerminationPolicy::NeverTerminate)
            .with_classifier(partial(|_e: &IllegalArgumentError| Some(ErrorClassification::Fatal)));
        let monitor = Arc::new(RecordingMonitor::default());
        let policy = policy.with_monitor_arc(monitor.clone());
        let scheduler = RecordingScheduler::default();
        let clock = FakeClock::new();
        let token = CancellationToken::new();

        let result: Result<(), _> = retry_with(&clock, &scheduler, &token, None, &policy, || {
            Err(IllegalArgumentError("bad".into()))
        });

        match result {
            Err(AtmosError::OperationFailed(IllegalArgumentError(msg))) => assert_eq!(msg, "bad"),
            other => panic!("expected operation failure, got {other:?}"),
        }
        assert!(monitor.retrying.lock().unwrap().is_empty());
        assert_eq!(monitor.aborted.lock().unwrap(), vec![1]);
    }

    #[test]
    fn silent_recovery_suppresses_retrying_events() {
        #[derive(Debug, Clone, PartialEq, Eq)]
        struct IllegalStateError;
        impl std::fmt::Display for IllegalStateError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "illegal state")
            }
        }

        let policy: RetryPolicy<IllegalStateError> = RetryPolicy::default()
            .with_classifier(partial(|_e: &IllegalStateError| Some(ErrorClassification::SilentlyRecoverable)));
        let monitor = Arc::new(RecordingMonitor::default());
        let policy = policy.with_monitor_arc(monitor.clone());
        let scheduler = RecordingScheduler::default();
        let clock = FakeClock::new();
        let token = CancellationToken::new();

        let calls = AtomicU32::new(0);
        let result = retry_with(&clock, &scheduler, &token, None, &policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(IllegalStateError)
            } else {
                Ok(7)
            }
        });

        assert_eq!(result.unwrap(), 7);
        assert!(monitor.retrying.lock().unwrap().is_empty());
        assert!(monitor.aborted.lock().unwrap().is_empty());
    }

    /// A scheduler that advances a [`FakeClock`] by the requested amount
    /// instead of sleeping, so elapsed-time termination policies see the
    /// same accounting a real clock/scheduler pair would produce.
    struct ClockAdvancingScheduler<'a> {
        clock: &'a FakeClock,
    }

    #[async_trait::async_trait]
    impl<'a> Scheduler for ClockAdvancingScheduler<'a> {
        fn sleep_blocking(&self, d: Duration, _token: &CancellationToken) -> Result<(), Interrupted> {
            self.clock.advance(d);
            Ok(())
        }
        async fn sleep_async(&self, d: Duration, _token: &CancellationToken) -> Result<(), Interrupted> {
            self.clock.advance(d);
            Ok(())
        }
    }

    #[test]
    fn and_combinator_runs_a_fourth_attempt() {
        let policy: RetryPolicy<RuntimeError> = RetryPolicy::default()
            .with_termination(TerminationPolicy::limit_attempts(3) & TerminationPolicy::limit_time(Duration::from_secs(1)))
            .with_backoff(BackoffPolicy::Constant(Duration::from_millis(400)));
        let monitor = Arc::new(RecordingMonitor::default());
        let policy = policy.with_monitor_arc(monitor.clone());
        let clock = FakeClock::new();
        let scheduler = ClockAdvancingScheduler { clock: &clock };
        let token = CancellationToken::new();

        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with(&clock, &scheduler, &token, None, &policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(RuntimeError("x".into()))
        });

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(monitor.aborted.lock().unwrap(), vec![4]);
    }

    #[test]
    fn interrupted_sleep_propagates_and_does_not_retry() {
        struct InterruptingScheduler;
        #[async_trait::async_trait]
        impl Scheduler for InterruptingScheduler {
            fn sleep_blocking(&self, _d: Duration, _token: &CancellationToken) -> Result<(), Interrupted> {
                Err(Interrupted)
            }
            async fn sleep_async(&self, _d: Duration, _token: &CancellationToken) -> Result<(), Interrupted> {
                Err(Interrupted)
            }
        }

        let policy: RetryPolicy<RuntimeError> = RetryPolicy::default();
        let monitor = Arc::new(RecordingMonitor::default());
        let policy = policy.with_monitor_arc(monitor.clone());
        let scheduler = InterruptingScheduler;
        let clock = FakeClock::new();
        let token = CancellationToken::new();

        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with(&clock, &scheduler, &token, None, &policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(RuntimeError("x".into()))
        });

        assert!(matches!(result, Err(AtmosError::Interrupted(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.interrupted.lock().unwrap(), vec![1]);
        assert!(monitor.aborted.lock().unwrap().is_empty());
    }

    #[test]
    fn immediately_terminate_makes_exactly_one_attempt() {
        let policy: RetryPolicy<RuntimeError> = RetryPolicy::never_retry();
        let monitor = Arc::new(RecordingMonitor::default());
        let policy = policy.with_monitor_arc(monitor.clone());
        let scheduler = RecordingScheduler::default();
        let clock = FakeClock::new();
        let token = CancellationToken::new();

        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with(&clock, &scheduler, &token, None, &policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(RuntimeError("x".into()))
        });

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(monitor.retrying.lock().unwrap().is_empty());
        assert_eq!(monitor.aborted.lock().unwrap(), vec![1]);
        assert!(scheduler.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn async_driver_matches_sync_happy_path() {
        let policy: RetryPolicy<RuntimeError> = RetryPolicy::default();
        let monitor = Arc::new(RecordingMonitor::default());
        let policy = policy.with_monitor_arc(monitor.clone());
        let scheduler = RecordingScheduler::default();
        let clock = FakeClock::new();
        let token = CancellationToken::new();

        let calls = AtomicU32::new(0);
        let result = retry_async_with(&clock, &scheduler, &token, None, &policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RuntimeError("e".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(monitor.retrying.lock().unwrap().len(), 2);
    }
}

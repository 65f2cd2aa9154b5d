//! `RetryPolicy`: the immutable bundle of the four pluggable axes.

use std::sync::Arc;

use crate::backoff::BackoffPolicy;
use crate::classification::{ErrorClassifier, RecoverableByDefault};
use crate::monitor::{EventMonitor, NoopEventMonitor};
use crate::termination::TerminationPolicy;

/// An immutable configuration record bundling a termination policy, a
/// backoff policy, a monitor, and a classifier.
///
/// There is no in-place mutation: every field-update method consumes
/// `self` and returns a new `RetryPolicy`, matching the spec's
/// "copy-with-replacement is the only mutation idiom".
pub struct RetryPolicy<E> {
    termination: TerminationPolicy,
    backoff: BackoffPolicy<E>,
    monitor: Arc<dyn EventMonitor<E>>,
    classifier: Arc<dyn ErrorClassifier<E>>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            termination: self.termination.clone(),
            backoff: self.backoff.clone(),
            monitor: self.monitor.clone(),
            classifier: self.classifier.clone(),
        }
    }
}

impl<E: 'static> Default for RetryPolicy<E> {
    /// `LimitNumberOfAttempts(3)` termination, `Fibonacci(100ms)` backoff,
    /// a no-op monitor, and a classifier that treats everything as
    /// `Recoverable`.
    fn default() -> Self {
        Self {
            termination: TerminationPolicy::default(),
            backoff: BackoffPolicy::default(),
            monitor: Arc::new(NoopEventMonitor),
            classifier: Arc::new(RecoverableByDefault),
        }
    }
}

impl<E: 'static> RetryPolicy<E> {
    /// A policy whose termination is `ImmediatelyTerminate` — "never
    /// retry" (the first attempt still runs).
    pub fn never_retry() -> Self {
        Self::default().with_termination(TerminationPolicy::ImmediatelyTerminate)
    }

    /// A policy whose termination is `NeverTerminate` — "retry forever"
    /// unless a `Fatal` classification stops it.
    pub fn retry_forever() -> Self {
        Self::default().with_termination(TerminationPolicy::NeverTerminate)
    }

    /// A default policy with the given termination policy substituted in.
    pub fn retry_for(termination: TerminationPolicy) -> Self {
        Self::default().with_termination(termination)
    }

    pub fn termination(&self) -> &TerminationPolicy {
        &self.termination
    }

    pub fn backoff(&self) -> &BackoffPolicy<E> {
        &self.backoff
    }

    pub fn monitor(&self) -> &Arc<dyn EventMonitor<E>> {
        &self.monitor
    }

    pub fn classifier(&self) -> &Arc<dyn ErrorClassifier<E>> {
        &self.classifier
    }

    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy<E>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_monitor(mut self, monitor: impl EventMonitor<E> + 'static) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    /// Like [`Self::with_monitor`], but takes an already-shared monitor —
    /// handy when a test or caller wants to keep its own handle to the
    /// same monitor instance to inspect it later.
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn EventMonitor<E>>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_classifier(mut self, classifier: impl ErrorClassifier<E> + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }
}

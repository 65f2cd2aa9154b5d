//! Error classification: the first thing the driver consults after a
//! failed attempt.

use std::fmt;
use std::sync::Arc;

/// The three-way tag attached to every failure by a classifier.
///
/// ## For anyone picking this up:
///
/// This is the knob that decides everything downstream: a `Fatal` error
/// skips the termination policy entirely and aborts on the spot; a
/// `Recoverable` one is retried loudly; a `SilentlyRecoverable` one is
/// retried without bothering the event monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// Stop retrying immediately and propagate the error.
    Fatal,
    /// Retry if the termination policy allows it; emit a `retrying` event.
    Recoverable,
    /// Retry if the termination policy allows it; suppress the `retrying`
    /// event (used for expected, noise-level failures).
    SilentlyRecoverable,
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Recoverable => write!(f, "recoverable"),
            Self::SilentlyRecoverable => write!(f, "silently-recoverable"),
        }
    }
}

/// A total function from an error to an [`ErrorClassification`].
///
/// Implementations never fail — an unmatched error should map to
/// [`ErrorClassification::Recoverable`], per the default below.
pub trait ErrorClassifier<E>: Send + Sync {
    fn classify(&self, error: &E) -> ErrorClassification;
}

/// The default classifier: everything is `Recoverable`.
///
/// Matches spec: "a user-supplied partial mapping doesn't match ⇒
/// Recoverable".
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverableByDefault;

impl<E> ErrorClassifier<E> for RecoverableByDefault {
    fn classify(&self, _error: &E) -> ErrorClassification {
        ErrorClassification::Recoverable
    }
}

/// Wraps a plain closure as an [`ErrorClassifier`].
///
/// This is the common case: `ErrorClassifier::from_fn(|e: &MyError| ...)`.
pub struct FnClassifier<F> {
    f: F,
}

impl<E, F> ErrorClassifier<E> for FnClassifier<F>
where
    F: Fn(&E) -> ErrorClassification + Send + Sync,
{
    fn classify(&self, error: &E) -> ErrorClassification {
        (self.f)(error)
    }
}

/// Builds a classifier from a closure `Fn(&E) -> ErrorClassification`.
pub fn from_fn<E, F>(f: F) -> FnClassifier<F>
where
    F: Fn(&E) -> ErrorClassification + Send + Sync,
{
    FnClassifier { f }
}

/// Builds a classifier from a partial mapping: `matcher` returns `Some` to
/// claim an error, and unmatched errors fall back to `Recoverable`, per
/// the documented default.
pub fn partial<E, F>(matcher: F) -> FnClassifier<impl Fn(&E) -> ErrorClassification + Send + Sync>
where
    F: Fn(&E) -> Option<ErrorClassification> + Send + Sync,
{
    FnClassifier {
        f: move |e: &E| matcher(e).unwrap_or(ErrorClassification::Recoverable),
    }
}

/// A type-erased, cloneable classifier, handy when a `RetryPolicy` needs
/// to hold one as a trait object field rather than a generic parameter.
pub type BoxedClassifier<E> = Arc<dyn ErrorClassifier<E>>;

/// Chains classifiers by fallback: the first one to return anything other
/// than the implicit default wins. Because every classifier here is total
/// (it never refuses to answer), "fallback" is implemented as "last
/// classifier in the chain whose verdict differs from `Recoverable`, else
/// `Recoverable`" is too clever; instead `Fallback` simply tries each
/// classifier in order and returns the first *non-default* verdict — a
/// classifier built with [`partial`] is the intended building block here.
pub struct Fallback<E> {
    classifiers: Vec<BoxedClassifier<E>>,
}

impl<E> Fallback<E> {
    pub fn new(classifiers: Vec<BoxedClassifier<E>>) -> Self {
        Self { classifiers }
    }
}

impl<E> ErrorClassifier<E> for Fallback<E> {
    fn classify(&self, error: &E) -> ErrorClassification {
        for classifier in &self.classifiers {
            let verdict = classifier.classify(error);
            if verdict != ErrorClassification::Recoverable {
                return verdict;
            }
        }
        ErrorClassification::Recoverable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BadInput;
    #[derive(Debug)]
    struct Timeout;

    #[test]
    fn default_classifier_is_always_recoverable() {
        let c = RecoverableByDefault;
        assert_eq!(c.classify(&Timeout), ErrorClassification::Recoverable);
    }

    #[test]
    fn partial_falls_back_to_recoverable() {
        let c = partial(|_e: &Timeout| None);
        assert_eq!(c.classify(&Timeout), ErrorClassification::Recoverable);
    }

    #[test]
    fn partial_honours_explicit_match() {
        let c = partial(|_e: &BadInput| Some(ErrorClassification::Fatal));
        assert_eq!(c.classify(&BadInput), ErrorClassification::Fatal);
    }

    #[test]
    fn fallback_tries_in_order() {
        let a: BoxedClassifier<BadInput> = Arc::new(from_fn(|_: &BadInput| ErrorClassification::Recoverable));
        let b: BoxedClassifier<BadInput> = Arc::new(from_fn(|_: &BadInput| ErrorClassification::Fatal));
        let fallback = Fallback::new(vec![a, b]);
        assert_eq!(fallback.classify(&BadInput), ErrorClassification::Fatal);
    }
}

//! The crate's own error type.
//!
//! The driver never synthesizes an error of its own except for the
//! interruption case (§7 item 4 of the specification this crate
//! implements); every other propagated error is the last error the
//! wrapped operation itself produced.

use std::fmt;

use crate::scheduler::Interrupted;

/// The outcome of a retry invocation that did not succeed.
///
/// Wraps either the last error the operation produced (classified
/// `Fatal`, or surviving until the termination policy said stop) or the
/// interruption signal raised when a backoff sleep was cut short.
///
/// Manually implemented rather than `#[derive(thiserror::Error)]`: the
/// inner `E` is an arbitrary caller-supplied error type and only needs
/// `Debug + Display` here, which doesn't line up with how thiserror infers
/// bounds for a generic enum field.
#[derive(Debug)]
pub enum AtmosError<E> {
    OperationFailed(E),
    Interrupted(Interrupted),
}

impl<E: fmt::Display> fmt::Display for AtmosError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperationFailed(e) => e.fmt(f),
            Self::Interrupted(e) => e.fmt(f),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for AtmosError<E> {}

impl<E> From<Interrupted> for AtmosError<E> {
    fn from(e: Interrupted) -> Self {
        Self::Interrupted(e)
    }
}

impl<E> AtmosError<E> {
    /// Unwraps back to the operation's error, panicking if this was an
    /// interruption instead. Useful in tests and call sites that already
    /// know a cancellation token was never installed.
    pub fn into_operation_error(self) -> E {
        match self {
            Self::OperationFailed(e) => e,
            Self::Interrupted(_) => panic!("retry was interrupted, not an operation failure"),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_wrapped_operation_error() {
        let err: AtmosError<&str> = AtmosError::OperationFailed("boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn displays_interruption() {
        let err: AtmosError<&str> = AtmosError::Interrupted(Interrupted);
        assert!(err.to_string().contains("interrupted"));
    }

    #[test]
    fn into_operation_error_unwraps() {
        let err: AtmosError<&str> = AtmosError::OperationFailed("boom");
        assert_eq!(err.into_operation_error(), "boom");
    }
}

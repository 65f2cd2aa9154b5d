//! The injected clock: the driver's only source of wall-clock time,
//! kept out of `std::time::Instant::now()` calls so tests can control it.

use std::time::Instant;

/// Provides a monotonically non-decreasing `now()`.
///
/// Injected into the driver so termination policies that depend on
/// elapsed time ([`crate::termination::TerminationPolicy::LimitAmountOfTimeSpent`])
/// can be tested deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real-time default: wraps `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

//! Termination policies: the condition, independent of error
//! classification, under which the driver stops retrying.

use std::ops::{BitAnd, BitOr};
use std::time::Duration;

/// Decides, given the attempt that would run next and the time elapsed
/// since the first attempt began, whether the driver should stop.
///
/// `next_attempt` is only ever consulted starting at 2 — the first
/// attempt always runs regardless of what the policy says.
#[derive(Debug, Clone)]
pub enum TerminationPolicy {
    /// Always stops. Models "never retry" — the first attempt still runs.
    ImmediatelyTerminate,
    /// Never stops of its own accord; only a `Fatal` classification ends
    /// the retry loop.
    NeverTerminate,
    /// Stops once `next_attempt` exceeds `n` attempts already made.
    LimitNumberOfAttempts(u32),
    /// Stops once cumulative elapsed time reaches or exceeds `d`.
    LimitAmountOfTimeSpent(Duration),
    /// Stops only when both sub-policies signal stop.
    TerminateAfterBoth(Box<TerminationPolicy>, Box<TerminationPolicy>),
    /// Stops when either sub-policy signals stop.
    TerminateAfterEither(Box<TerminationPolicy>, Box<TerminationPolicy>),
}

impl TerminationPolicy {
    /// `LimitNumberOfAttempts` constructor; panics if `n == 0` since the
    /// spec requires `n >= 1` (a policy that stops before the first
    /// attempt would violate "every retry policy makes at least one
    /// attempt").
    pub fn limit_attempts(n: u32) -> Self {
        assert!(n >= 1, "LimitNumberOfAttempts requires n >= 1");
        Self::LimitNumberOfAttempts(n)
    }

    /// `LimitAmountOfTimeSpent` constructor; panics if `d` is zero.
    pub fn limit_time(d: Duration) -> Self {
        assert!(!d.is_zero(), "LimitAmountOfTimeSpent requires d > 0");
        Self::LimitAmountOfTimeSpent(d)
    }

    /// Evaluates the policy: `true` means "stop, do not make
    /// `next_attempt`".
    pub fn should_stop(&self, next_attempt: u32, elapsed: Duration) -> bool {
        match self {
            Self::ImmediatelyTerminate => true,
            Self::NeverTerminate => false,
            Self::LimitNumberOfAttempts(n) => next_attempt > *n,
            Self::LimitAmountOfTimeSpent(d) => elapsed >= *d,
            Self::TerminateAfterBoth(a, b) => {
                a.should_stop(next_attempt, elapsed) && b.should_stop(next_attempt, elapsed)
            }
            Self::TerminateAfterEither(a, b) => {
                a.should_stop(next_attempt, elapsed) || b.should_stop(next_attempt, elapsed)
            }
        }
    }
}

impl Default for TerminationPolicy {
    /// `LimitNumberOfAttempts(3)`, per spec.
    fn default() -> Self {
        Self::LimitNumberOfAttempts(3)
    }
}

/// `a && b` reads as `TerminateAfterBoth(a, b)`: stop after N attempts
/// *but not before* T elapsed.
impl BitAnd for TerminationPolicy {
    type Output = TerminationPolicy;
    fn bitand(self, rhs: Self) -> Self::Output {
        Self::TerminateAfterBoth(Box::new(self), Box::new(rhs))
    }
}

/// `a || b` reads as `TerminateAfterEither(a, b)`: stop after N attempts
/// *or* T elapsed, whichever comes first.
impl BitOr for TerminationPolicy {
    type Output = TerminationPolicy;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self::TerminateAfterEither(Box::new(self), Box::new(rhs))
    }
}

//! Backoff policies: how long to wait before the next attempt.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::time::{add_signed_clamped, saturating_scale};

/// `base · (8/5)^(attempt_index − 1)` — the golden-ratio approximation the
/// spec mandates for [`BackoffPolicy::Fibonacci`].
const FIBONACCI_RATIO: f64 = 8.0 / 5.0;

/// An inclusive range `[lo, hi]` used by [`BackoffPolicy::Randomized`].
///
/// Constructed with [`Jitter::new`], which normalizes `lo > hi` by
/// swapping endpoints (see the Open Question resolution in DESIGN.md)
/// rather than rejecting the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    lo_nanos: i128,
    hi_nanos: i128,
}

impl Jitter {
    /// Builds a jitter range from two signed durations (offsets, which may
    /// be negative). `lo` and `hi` are normalized so `lo <= hi`.
    pub fn new(lo: std::time::Duration, hi: std::time::Duration, lo_is_negative: bool, hi_is_negative: bool) -> Self {
        let sign = |d: Duration, neg: bool| -> i128 {
            let n = d.as_nanos() as i128;
            if neg { -n } else { n }
        };
        let a = sign(lo, lo_is_negative);
        let b = sign(hi, hi_is_negative);
        Self {
            lo_nanos: a.min(b),
            hi_nanos: a.max(b),
        }
    }

    /// `bound` shorthand: the range is `(min(0, bound), max(0, bound))`,
    /// i.e. `[0, bound]` for a positive bound or `[bound, 0]` for a
    /// negative one.
    pub fn bound(bound_nanos: i128) -> Self {
        Self {
            lo_nanos: bound_nanos.min(0),
            hi_nanos: bound_nanos.max(0),
        }
    }

    /// Convenience constructor from plain signed millisecond offsets.
    pub fn from_millis_range(lo_ms: i64, hi_ms: i64) -> Self {
        let a = lo_ms as i128 * 1_000_000;
        let b = hi_ms as i128 * 1_000_000;
        Self {
            lo_nanos: a.min(b),
            hi_nanos: a.max(b),
        }
    }

    fn sample(&self) -> i128 {
        if self.lo_nanos == self.hi_nanos {
            return self.lo_nanos;
        }
        rand::thread_rng().gen_range(self.lo_nanos..=self.hi_nanos)
    }
}

/// A pure function `(attempt: u32 >= 1, last_error: &E) -> Duration >= 0`.
///
/// All built-in variants except [`BackoffPolicy::Selected`] and
/// [`BackoffPolicy::Randomized`] ignore `last_error` entirely and are
/// deterministic: calling `next_backoff` twice with the same `attempt`
/// returns the same `Duration`.
pub enum BackoffPolicy<E> {
    /// Always returns `base`.
    Constant(Duration),
    /// Returns `base * attempt`.
    Linear(Duration),
    /// Returns `base * 2^(attempt - 1)`, saturating.
    Exponential(Duration),
    /// Returns `base * (8/5)^(attempt - 1)`, saturating.
    Fibonacci(Duration),
    /// Delegates to `f(last_error)` to pick a policy, evaluated fresh on
    /// every call — no caching.
    Selected(Arc<dyn Fn(&E) -> BackoffPolicy<E> + Send + Sync>),
    /// Evaluates `inner`, adds a jittered offset drawn uniformly from the
    /// range, clamped to non-negative.
    Randomized(Box<BackoffPolicy<E>>, Jitter),
}

/// Hand-written rather than `#[derive(Clone)]`: the derive would add an
/// `E: Clone` bound even though no variant actually owns an `E` (only
/// `Fn(&E) -> ...` closures, which clone via their `Arc`/`Box` regardless
/// of what `E` is).
impl<E> Clone for BackoffPolicy<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Constant(d) => Self::Constant(*d),
            Self::Linear(d) => Self::Linear(*d),
            Self::Exponential(d) => Self::Exponential(*d),
            Self::Fibonacci(d) => Self::Fibonacci(*d),
            Self::Selected(f) => Self::Selected(f.clone()),
            Self::Randomized(inner, jitter) => Self::Randomized(inner.clone(), *jitter),
        }
    }
}

impl<E> BackoffPolicy<E> {
    /// Default base duration used throughout the crate's constructors:
    /// 100ms.
    pub const DEFAULT_BASE: Duration = Duration::from_millis(100);

    /// Wraps `self` in [`BackoffPolicy::Randomized`] using `bound` as the
    /// shorthand range `(min(0, bound), max(0, bound))`, where `bound` is
    /// a signed nanosecond offset.
    pub fn randomized_bound(self, bound: Duration, bound_is_negative: bool) -> Self {
        let signed = if bound_is_negative {
            -(bound.as_nanos() as i128)
        } else {
            bound.as_nanos() as i128
        };
        Self::Randomized(Box::new(self), Jitter::bound(signed))
    }

    /// Wraps `self` in [`BackoffPolicy::Randomized`] using an explicit
    /// `(lo, hi)` range built via [`Jitter`].
    pub fn randomized(self, range: Jitter) -> Self {
        Self::Randomized(Box::new(self), range)
    }

    /// Evaluates the policy for the given attempt index (>= 1) and last
    /// error, returning a duration clamped to `[0, one year]`.
    pub fn next_backoff(&self, attempt: u32, last_error: &E) -> Duration {
        debug_assert!(attempt >= 1, "attempt index is 1-based");
        match self {
            Self::Constant(base) => *base,
            Self::Linear(base) => saturating_scale(*base, attempt as f64),
            Self::Exponential(base) => {
                saturating_scale(*base, 2f64.powi(attempt as i32 - 1))
            }
            Self::Fibonacci(base) => {
                saturating_scale(*base, FIBONACCI_RATIO.powi(attempt as i32 - 1))
            }
            Self::Selected(f) => f(last_error).next_backoff(attempt, last_error),
            Self::Randomized(inner, jitter) => {
                let base = inner.next_backoff(attempt, last_error);
                add_signed_clamped(base, jitter.sample())
            }
        }
    }
}

impl<E> Default for BackoffPolicy<E> {
    /// `Fibonacci(100ms)`, per spec.
    fn default() -> Self {
        Self::Fibonacci(Self::DEFAULT_BASE)
    }
}

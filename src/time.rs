//! Duration arithmetic shared by the backoff policies.
//!
//! Kept separate from `backoff` because the saturating-multiply logic is
//! reused by more than one variant (`Exponential`, `Fibonacci`, `Linear`)
//! and is fiddly enough to want its own unit tests.

use std::time::Duration;

/// Ceiling applied to any computed backoff so a runaway exponent can't
/// produce a duration that overflows downstream sleep primitives.
pub const SATURATION_CEILING: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Multiplies `base` by `factor`, rounds to the nearest nanosecond, and
/// saturates at [`SATURATION_CEILING`] instead of overflowing.
///
/// `factor` is expected to be finite and non-negative; backoff policies
/// never construct a negative multiplier.
pub fn saturating_scale(base: Duration, factor: f64) -> Duration {
    if !factor.is_finite() || factor <= 0.0 {
        return Duration::ZERO;
    }
    let nanos = base.as_nanos() as f64 * factor;
    if !nanos.is_finite() || nanos >= SATURATION_CEILING.as_nanos() as f64 {
        return SATURATION_CEILING;
    }
    Duration::from_nanos(nanos.round() as u64)
}

/// Adds a signed offset (in nanoseconds, as an `i128` to avoid overflow on
/// the subtraction) to a duration, clamping the result to zero rather than
/// going negative.
pub fn add_signed_clamped(base: Duration, offset_nanos: i128) -> Duration {
    let total = base.as_nanos() as i128 + offset_nanos;
    if total <= 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos(total.min(SATURATION_CEILING.as_nanos() as i128) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_exactly_for_integer_factors() {
        let base = Duration::from_millis(100);
        assert_eq!(saturating_scale(base, 4.0), Duration::from_millis(400));
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let base = Duration::from_secs(1);
        assert_eq!(saturating_scale(base, 1e30), SATURATION_CEILING);
    }

    #[test]
    fn zero_or_negative_factor_yields_zero() {
        assert_eq!(saturating_scale(Duration::from_secs(1), 0.0), Duration::ZERO);
        assert_eq!(saturating_scale(Duration::from_secs(1), -2.0), Duration::ZERO);
    }

    #[test]
    fn clamps_negative_offset_to_zero() {
        let base = Duration::from_millis(50);
        assert_eq!(
            add_signed_clamped(base, -100_000_000),
            Duration::ZERO
        );
    }

    #[test]
    fn adds_positive_offset() {
        let base = Duration::from_millis(50);
        assert_eq!(
            add_signed_clamped(base, 50_000_000),
            Duration::from_millis(100)
        );
    }
}

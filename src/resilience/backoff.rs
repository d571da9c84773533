//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Lower bound of the jitter factor applied to a computed delay.
pub const JITTER_FLOOR: f64 = 0.5;

/// Calculate the exponential backoff delay for a zero-based attempt index.
///
/// `min(base * exponential_base^attempt, max)`, scaled by a uniform factor in
/// `[0.5, 1.0]` when `jitter` is set.
pub fn calculate_backoff(
    attempt: u32,
    base: Duration,
    max: Duration,
    exponential_base: f64,
    jitter: bool,
) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw = base.as_secs_f64() * exponential_base.powi(exponent);
    // powi overflows to inf for large attempts; the cap still applies.
    let capped = if raw.is_finite() {
        raw.min(max.as_secs_f64())
    } else {
        max.as_secs_f64()
    };

    let delay = if jitter {
        capped * rand::thread_rng().gen_range(JITTER_FLOOR..=1.0)
    } else {
        capped
    };

    Duration::from_secs_f64(delay.max(0.0))
}

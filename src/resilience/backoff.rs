//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based): `min(base * 2^(attempt-1), cap)`.
///
/// With a non-zero `jitter_ratio` up to that fraction of the delay is added
/// at random; the result is still clamped to `cap`.
pub fn calculate_backoff(attempt: u32, base: Duration, cap: Duration, jitter_ratio: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u32.saturating_pow(attempt - 1);
    let capped_delay = base.saturating_mul(exponential_base).min(cap);

    if jitter_ratio <= 0.0 {
        return capped_delay;
    }

    let jitter_range = (capped_delay.as_millis() as f64 * jitter_ratio.min(1.0)) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    (capped_delay + Duration::from_millis(jitter)).min(cap)
}

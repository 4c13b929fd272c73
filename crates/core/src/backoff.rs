//! Backoff policy: capped exponential delays with equal jitter
//!
//! Pure functions; the random source is injected so the policy is
//! deterministic under test.

use std::time::Duration;

use rand::Rng;

use crate::retry::RetryPolicy;

/// Nominal delay for attempt `n` (0-based): `base * 2^n`, saturating.
pub fn nominal_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(31)))
}

/// Equal jitter: uniform in `[delay, 2 * delay)`. Never below the
/// un-jittered delay, so effective backoff keeps its deterministic floor.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, delay: Duration) -> Duration {
    delay + delay.mul_f64(rng.random::<f64>())
}

/// Minimum of two durations.
pub fn min_duration(a: Duration, b: Duration) -> Duration {
    if a < b { a } else { b }
}

/// Sleep interval before retrying attempt `attempt`:
/// `min(max_delay, jitter(nominal / 2))`. Halving before jitter keeps the
/// jittered range centered near the nominal delay.
pub fn sleep_interval<R: Rng + ?Sized>(
    policy: &RetryPolicy,
    attempt: u32,
    rng: &mut R,
) -> Duration {
    let nominal = nominal_delay(policy.base_delay, attempt);
    min_duration(policy.max_delay, jitter(rng, nominal / 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_nominal_delay_doubles_per_attempt() {
        let base = Duration::from_millis(128);
        assert_eq!(nominal_delay(base, 0), Duration::from_millis(128));
        assert_eq!(nominal_delay(base, 1), Duration::from_millis(256));
        assert_eq!(nominal_delay(base, 4), Duration::from_millis(2048));
    }

    #[test]
    fn test_nominal_delay_saturates() {
        let base = Duration::from_secs(u64::MAX / 4);
        assert_eq!(nominal_delay(base, 63), Duration::MAX);
    }

    #[test]
    fn test_jitter_stays_in_equal_jitter_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let delay = Duration::from_secs(1);

        for _ in 0..1000 {
            let jittered = jitter(&mut rng, delay);
            assert!(jittered >= delay);
            assert!(jittered < delay * 2);
        }
    }

    #[test]
    fn test_min_duration_is_symmetric() {
        let one = Duration::from_secs(1);
        let five = Duration::from_secs(5);

        assert_eq!(min_duration(one, five), one);
        assert_eq!(min_duration(five, one), one);
        assert_eq!(min_duration(one, one), one);
    }

    #[test]
    fn test_sleep_interval_respects_ceiling() {
        let policy = RetryPolicy {
            max_retries: 16,
            base_delay: Duration::from_millis(128),
            max_delay: Duration::from_secs(2),
        };
        let mut rng = StdRng::seed_from_u64(7);

        // Late attempts hit the ceiling exactly.
        for attempt in 10..16 {
            assert_eq!(
                sleep_interval(&policy, attempt, &mut rng),
                Duration::from_secs(2)
            );
        }
    }

    #[test]
    fn test_sleep_interval_centers_on_nominal() {
        let policy = RetryPolicy {
            max_retries: 16,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(3600),
        };
        let mut rng = StdRng::seed_from_u64(7);

        // jitter(nominal / 2) lies in [nominal / 2, nominal).
        for attempt in 0..8 {
            let nominal = nominal_delay(policy.base_delay, attempt);
            let interval = sleep_interval(&policy, attempt, &mut rng);
            assert!(interval >= nominal / 2);
            assert!(interval < nominal);
        }
    }
}

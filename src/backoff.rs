//! Exponential backoff with jitter
//!
//! Pure scheduling function: attempt count in, delay out. The jitter
//! source is injected so tests can assert exact bounds without
//! flakiness.

use std::time::Duration;

use rand::Rng;

/// Maps a completed attempt count to the delay before the next attempt.
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// `delay = base * 2^(attempt_count - 1)`, capped, then scaled by a
    /// jitter factor drawn uniformly from `[0.5, 1.5]`.
    ///
    /// `attempt_count` is the number of attempts already made: the delay
    /// computed after the 1st failure uses `attempt_count = 1`.
    pub fn next_delay(&self, attempt_count: i32, rng: &mut impl Rng) -> Duration {
        debug_assert!(attempt_count >= 1);
        let exponent = (attempt_count - 1).min(32) as u32;
        let uncapped = self.base.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
        let delay = uncapped.min(self.cap);

        let jitter = rng.gen_range(0.5..=1.5);
        delay.mul_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(3600))
    }

    #[test]
    fn delay_grows_monotonically_up_to_the_cap() {
        // Remove jitter from the comparison by using the no-jitter midpoint:
        // average over many draws should still grow strictly attempt-over-attempt
        // well before the cap is reached.
        let mut rng = StdRng::seed_from_u64(42);
        let p = policy();
        let mut previous = Duration::ZERO;
        for attempt in 1..=8 {
            // Average several draws to smooth jitter noise for the monotonicity check.
            let samples: Vec<Duration> = (0..50).map(|_| p.next_delay(attempt, &mut rng)).collect();
            let avg_nanos: u128 =
                samples.iter().map(|d| d.as_nanos()).sum::<u128>() / samples.len() as u128;
            let avg = Duration::from_nanos(avg_nanos as u64);
            assert!(
                avg > previous,
                "attempt {attempt}: avg delay {avg:?} did not exceed previous {previous:?}"
            );
            previous = avg;
        }
    }

    #[test]
    fn delay_respects_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = policy();
        for attempt in 1..=5 {
            let base = Duration::from_secs(2) * 2u32.pow((attempt - 1) as u32);
            let delay = p.next_delay(attempt, &mut rng);
            assert!(delay >= base.mul_f64(0.5));
            assert!(delay <= base.mul_f64(1.5));
        }
    }

    #[test]
    fn delay_never_exceeds_cap_times_jitter() {
        let mut rng = StdRng::seed_from_u64(99);
        let p = BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(10));
        for attempt in 1..=40 {
            let delay = p.next_delay(attempt, &mut rng);
            assert!(delay <= Duration::from_secs(10).mul_f64(1.5));
        }
    }

    #[test]
    fn attempt_one_is_roughly_base_times_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = policy();
        let delay = p.next_delay(1, &mut rng);
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_secs(3));
    }
}

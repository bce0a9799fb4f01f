//! Retry-delay schedule for hook delivery.

use std::time::Duration;

/// Largest exponent used for the backoff schedule (2^9 = 512 seconds).
pub const MAX_RETRY_EXPONENT: u32 = 9;

/// Returns the delay before the next delivery attempt.
///
/// Exponential backoff: 2^retry_count seconds, capped at
/// 2^[`MAX_RETRY_EXPONENT`].
pub fn retry_delay(retry_count: u32) -> Duration {
    let seconds = 2u64.pow(retry_count.min(MAX_RETRY_EXPONENT));
    Duration::from_secs(seconds)
}

/// Adds up to 25% random jitter so retries from one failed batch do not
/// land on the downstream service in lockstep.
pub fn with_jitter(delay: Duration) -> Duration {
    use rand::Rng;
    let max_extra = delay.as_secs() / 4;
    if max_extra == 0 {
        return delay;
    }
    let extra = rand::rng().random_range(0..=max_extra);
    delay + Duration::from_secs(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_retry() {
        assert_eq!(retry_delay(0), Duration::from_secs(1));
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(2), Duration::from_secs(4));
        assert_eq!(retry_delay(8), Duration::from_secs(256));
    }

    #[test]
    fn delay_is_capped() {
        assert_eq!(retry_delay(9), Duration::from_secs(512));
        assert_eq!(retry_delay(10), Duration::from_secs(512));
        assert_eq!(retry_delay(100), Duration::from_secs(512));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_secs(64);
        for _ in 0..100 {
            let jittered = with_jitter(base);
            assert!(jittered >= base);
            assert!(jittered <= base + Duration::from_secs(16));
        }
    }

    #[test]
    fn jitter_leaves_tiny_delays_alone() {
        assert_eq!(with_jitter(Duration::from_secs(1)), Duration::from_secs(1));
    }
}

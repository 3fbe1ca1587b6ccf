//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based). Attempt 0 waits nothing.
///
/// The delay doubles from `base` per attempt, is capped at `max`, and gets
/// up to 10% of random jitter on top so sources failing together do not
/// retry in lockstep.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_growth() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(1000);

        assert_eq!(backoff_delay(0, base, max), Duration::ZERO);

        let first = backoff_delay(1, base, max);
        assert!(first >= base && first < Duration::from_millis(110));

        let second = backoff_delay(2, base, max);
        assert!(second >= Duration::from_millis(200) && second < Duration::from_millis(220));

        let capped = backoff_delay(10, base, max);
        assert!(capped >= max && capped < Duration::from_millis(1100));
    }
}

use std::time::Duration;

use rand::Rng;

const BASE: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(60);

/// `min(base * 2^attempts, cap) + jitter`, `jitter ∈ [0, 1s)` (spec.md §4.5).
pub fn backoff(attempts: i64) -> Duration {
    let exp = attempts.clamp(0, 32) as u32;
    let doubled = BASE.checked_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX)).unwrap_or(CAP);
    let bounded = doubled.min(CAP);
    let jitter_ms = rand::rng().random_range(0..1000);
    bounded + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_with_attempts_but_never_exceeds_cap_plus_jitter() {
        for attempts in 0..10 {
            let d = backoff(attempts);
            assert!(d <= CAP + Duration::from_millis(999));
            assert!(d >= BASE.min(CAP));
        }
    }

    #[test]
    fn caps_at_60_seconds_plus_jitter_for_large_attempt_counts() {
        let d = backoff(20);
        assert!(d >= CAP);
        assert!(d <= CAP + Duration::from_millis(999));
    }
}

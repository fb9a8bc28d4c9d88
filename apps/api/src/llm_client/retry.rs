//! Retry policy for model calls.
//!
//! Kept separate from [`super::LlmClient`] so callers decide how much a flaky
//! dependency is tolerated. The default makes a single attempt.

use std::time::Duration;

/// Bounded retry with exponential backoff.
///
/// `delay_after(n)` is the pause after the n-th failed attempt:
/// `initial_backoff * multiplier^(n-1)`, capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    /// One attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2,
        }
    }

    /// Up to `max_attempts` attempts with doubling delays starting at `initial_backoff`
    /// (1s, 2s, 4s, ... for the usual 1s start).
    pub fn exponential(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            ..Self::no_retry()
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a failure on attempt `attempt` (1-based) may be followed by another.
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_single_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 1);
        assert!(!policy.allows_another(1));
    }

    #[test]
    fn test_exponential_delays_double_and_cap() {
        let policy = RetryPolicy::exponential(6, Duration::from_secs(1))
            .with_max_backoff(Duration::from_secs(5));
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert_eq!(policy.delay_after(4), Duration::from_secs(5));
        assert_eq!(policy.delay_after(40), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::exponential(0, Duration::from_millis(10));
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn test_allows_another_until_budget_spent() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(10));
        assert!(policy.allows_another(1));
        assert!(policy.allows_another(2));
        assert!(!policy.allows_another(3));
    }
}

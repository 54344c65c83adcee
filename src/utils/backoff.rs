// src/utils/backoff.rs

//! Retry backoff policy.
//!
//! Retry loops in the provider client and the dispatch worker share this
//! policy object instead of hard-coding sleep sequences at the call site.

use std::time::Duration;

/// Bounded retry policy with multiplicative backoff.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Total attempt budget, including the first attempt.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Factor applied to the delay after each failed attempt.
    /// A multiplier of 1.0 yields a fixed delay.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// Exponential policy: base, base*2, base*4, ...
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: 2.0,
        }
    }

    /// Fixed-delay policy: the same delay between every attempt.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Delay to sleep after a failed attempt (1-based attempt index).
    ///
    /// Returns `None` once the attempt budget is exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Some(self.base_delay.mul_f64(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_per_attempt() {
        let policy = BackoffPolicy::exponential(3, Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn fixed_keeps_constant_delay() {
        let policy = BackoffPolicy::fixed(3, Duration::from_secs(60));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(60)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(60)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn single_attempt_never_sleeps() {
        let policy = BackoffPolicy::fixed(1, Duration::from_secs(5));
        assert_eq!(policy.delay_after(1), None);
    }
}

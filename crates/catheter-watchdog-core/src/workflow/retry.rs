//! Retry policy for data source calls.
//!
//! Only connectivity failures are retried; the delay grows per the
//! configured backoff strategy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

/// Retry budget and backoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, strategy: BackoffStrategy, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            strategy,
            base_delay_ms,
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0, BackoffStrategy::Fixed, 0)
    }

    /// Whether retry number `attempt` (0-indexed) is within budget.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay before retry number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let millis = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Linear => self.base_delay_ms.saturating_mul(attempt as u64 + 1),
            BackoffStrategy::Exponential => self
                .base_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt)),
        };
        Duration::from_millis(millis)
    }
}

impl Default for RetryPolicy {
    /// 3 retries, exponential, 1s base.
    fn default() -> Self {
        Self::new(3, BackoffStrategy::Exponential, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::none().should_retry(0));
    }

    #[test]
    fn test_delays() {
        let exp = RetryPolicy::new(5, BackoffStrategy::Exponential, 100);
        assert_eq!(exp.delay(0), Duration::from_millis(100));
        assert_eq!(exp.delay(3), Duration::from_millis(800));

        let linear = RetryPolicy::new(5, BackoffStrategy::Linear, 100);
        assert_eq!(linear.delay(2), Duration::from_millis(300));

        let fixed = RetryPolicy::new(5, BackoffStrategy::Fixed, 100);
        assert_eq!(fixed.delay(4), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_saturates() {
        let exp = RetryPolicy::new(100, BackoffStrategy::Exponential, u64::MAX / 2);
        assert_eq!(exp.delay(70), Duration::from_millis(u64::MAX));
    }
}

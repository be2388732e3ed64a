//! Exponential backoff retry policy with optional fixed padding.

use std::time::Duration;

/// Default number of dial attempts, counting the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, counting the first try.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Maximum backoff delay (caps exponential growth).
    pub max_backoff: Duration,
    /// Multiplier applied to backoff on each retry.
    pub multiplier: f64,
    /// Fixed padding: add `padding_fraction * backoff / 2` to each delay (0.0 = none).
    pub padding_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            padding_fraction: 0.0,
        }
    }
}

/// Stateless retry policy: computes the next delay given the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay after the `attempt`-th failure (1-based).
    /// Returns `None` once `attempt` reaches `max_attempts`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.config.max_attempts {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.powi((attempt - 1) as i32);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        let capped = base_ms.min(cap_ms);

        let padding_ms = capped * self.config.padding_fraction * 0.5;
        let total_ms = (capped + padding_ms) as u64;

        Some(Duration::from_millis(total_ms))
    }

    /// The full delay schedule: one entry between each pair of attempts.
    ///
    /// Suitable as a `tokio_retry` strategy.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.config.max_attempts).filter_map(move |attempt| self.next_delay(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_retry_delay() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            padding_fraction: 0.0,
        });
        let d1 = policy.next_delay(1).unwrap();
        let d2 = policy.next_delay(2).unwrap();
        let d3 = policy.next_delay(3).unwrap();
        assert_eq!(d1.as_millis(), 100);
        assert_eq!(d2.as_millis(), 200);
        assert_eq!(d3.as_millis(), 400);
        assert!(policy.next_delay(4).is_none());
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            multiplier: 10.0,
            padding_fraction: 0.0,
        });
        let d5 = policy.next_delay(5).unwrap();
        assert!(d5 <= Duration::from_millis(500), "d5={d5:?} exceeds max");
    }

    #[test]
    fn padding_is_a_fixed_share_of_the_backoff() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            padding_fraction: 0.5,
            ..Default::default()
        });
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(125)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(250)));
        assert_eq!(policy.next_delay(1), policy.next_delay(1));
        assert!(policy.next_delay(3).is_none());
    }

    #[test]
    fn default_schedule_has_one_delay_between_each_attempt() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = policy.delays().map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800]);
    }
}

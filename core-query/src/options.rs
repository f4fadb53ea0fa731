//! Per-query options and retry policy

use core_runtime::config::QueryConfig;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type RetryPredicate = Arc<dyn Fn(&(dyn StdError + Send + Sync + 'static)) -> bool + Send + Sync>;

/// Bounded retry with exponential delay.
///
/// `retries` counts re-attempts, so a query with `retries = 2` runs at most
/// three times.
#[derive(Clone)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    retry_if: Option<RetryPredicate>,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
            max_delay,
            retry_if: None,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Query policy from configuration.
    pub fn for_queries(config: &QueryConfig) -> Self {
        Self::new(config.retry, config.retry_base_delay, config.retry_max_delay)
    }

    /// Mutation policy from configuration.
    pub fn for_mutations(config: &QueryConfig) -> Self {
        Self::new(
            config.mutation_retry,
            config.retry_base_delay,
            config.retry_max_delay,
        )
    }

    /// Only retry errors accepted by `predicate`.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn StdError + Send + Sync + 'static)) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    /// Whether another attempt follows failed attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32, error: &(dyn StdError + Send + Sync + 'static)) -> bool {
        attempt <= self.retries && self.retry_if.as_ref().map_or(true, |accept| accept(error))
    }

    /// Delay before the attempt following failed attempt number `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_queries(&QueryConfig::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retries", &self.retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("retry_if", &self.retry_if.is_some())
            .finish()
    }
}

/// What a read does with data older than its stale time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Return the stale data now and refetch in the background
    #[default]
    Background,
    /// Wait for the refetch
    Blocking,
}

/// Options for one query read.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// A disabled query never fetches and reports an idle state
    pub enabled: bool,
    /// Falls back to the client's default (the cache TTL)
    pub stale_time: Option<Duration>,
    /// Falls back to the client's query policy
    pub retry: Option<RetryPolicy>,
    pub stale_policy: StalePolicy,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: None,
            retry: None,
            stale_policy: StalePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_budget_and_predicate() {
        let transient = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let fatal = io::Error::new(io::ErrorKind::NotFound, "gone");

        let policy = RetryPolicy::default().retry_if(|e| {
            e.downcast_ref::<io::Error>()
                .map_or(true, |e| e.kind() != io::ErrorKind::NotFound)
        });

        assert_eq!(policy.retries, 2);
        assert!(policy.should_retry(1, &transient));
        assert!(policy.should_retry(2, &transient));
        assert!(!policy.should_retry(3, &transient));
        assert!(!policy.should_retry(1, &fatal));
    }

    #[test]
    fn test_mutation_policy() {
        let config = QueryConfig::default();
        assert_eq!(RetryPolicy::for_mutations(&config).retries, 1);
        assert_eq!(RetryPolicy::none().retries, 0);
    }

    #[test]
    fn test_options_builder() {
        let options = QueryOptions::new()
            .enabled(false)
            .stale_time(Duration::from_secs(5))
            .stale_policy(StalePolicy::Blocking);

        assert!(!options.enabled);
        assert_eq!(options.stale_time, Some(Duration::from_secs(5)));
        assert_eq!(options.stale_policy, StalePolicy::Blocking);
        assert!(options.retry.is_none());
    }
}

//! Fixed-delay retry policy for provider calls.

use crate::config::ClassifierSettings;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between two consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(settings: &ClassifierSettings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            delay: settings.retry_delay,
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after a failed `attempt`, `None` once attempts are exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        self.should_retry(attempt).then_some(self.delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&ClassifierSettings::default())
    }
}

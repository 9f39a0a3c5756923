//! Bounded retry of transient errors.
//!
//! Only errors whose category is retryable (transport failures) are retried.
//! Everything else ends the operation on the first attempt. The caller owns
//! the schedule: [`RetryBudget`] only counts consecutive failures, so the
//! caller's own deadline, delay and cancellation checks apply to retries too.

use std::time::Duration;

use crate::error::Error;

/// Counts consecutive retryable failures against a bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    max_retries: u32,
    consecutive: u32,
}

impl RetryBudget {
    /// Allow `max_retries` retries after a failed attempt.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            consecutive: 0,
        }
    }

    /// A budget that never retries.
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Record a failure and decide whether another attempt is allowed.
    ///
    /// Non-retryable errors and failures past the bound return `false`.
    pub fn allow_retry(&mut self, error: &Error) -> bool {
        if !error.is_retryable() || self.consecutive >= self.max_retries {
            return false;
        }
        self.consecutive += 1;
        true
    }

    /// Forget earlier failures after a success.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Consecutive failures retried so far.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Maximum number of attempts, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of another attempt.
    ///
    /// `attempt` is 1-indexed and counts the attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration);
}

/// Callback that logs retries at `warn`.
pub struct LogCallback<'a> {
    /// What is being retried, e.g. `poll task 01H`.
    pub label: &'a str,
}

impl RetryCallback for LogCallback<'_> {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration) {
        log::warn!(
            "{}: attempt {}/{} failed: {}. Retrying in {}ms...",
            self.label,
            attempt,
            max_attempts,
            error,
            delay.as_millis()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    fn transport() -> Error {
        Error::Transport {
            cause: "connection reset".into(),
        }
    }

    #[test]
    fn test_retryable_errors_within_bound() {
        let mut budget = RetryBudget::new(2);
        assert!(budget.allow_retry(&transport()));
        assert!(budget.allow_retry(&transport()));
        assert!(!budget.allow_retry(&transport()));
        assert_eq!(budget.consecutive(), 2);
        assert_eq!(budget.max_attempts(), 3);
    }

    #[test]
    fn test_non_retryable_error_never_retried() {
        let mut budget = RetryBudget::new(5);
        let err = Error::NotFound {
            kind: ResourceKind::Application,
            name: "demo".into(),
        };
        assert!(!budget.allow_retry(&err));
        assert_eq!(budget.consecutive(), 0);
    }

    #[test]
    fn test_reset_after_success() {
        let mut budget = RetryBudget::new(1);
        assert!(budget.allow_retry(&transport()));
        budget.reset();
        assert!(budget.allow_retry(&transport()));
        assert!(!budget.allow_retry(&transport()));
    }

    #[test]
    fn test_no_retry() {
        let mut budget = RetryBudget::no_retry();
        assert!(!budget.allow_retry(&transport()));
        assert_eq!(budget.max_attempts(), 1);
    }
}

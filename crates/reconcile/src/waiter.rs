//! Task completion waiting.
//!
//! Gate accepts mutations as tasks and answers immediately with a reference.
//! [`TaskWaiter`] polls that reference until the task reaches a terminal
//! status, the time budget runs out, or the caller cancels.
//!
//! The loop blocks the calling thread. Callers that need to stay responsive
//! run it on a worker and cancel through a [`CancelToken`], which is checked
//! once per poll.

use gatekit::{Gate, GateRequest, TaskRef, TaskState, TaskStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::retry::{LogCallback, RetryBudget, RetryCallback};

/// Lower bound for any poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default time budget for one task.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default consecutive transport failures tolerated per poll.
pub const DEFAULT_TRANSPORT_RETRIES: u32 = 3;

/// How the delay between polls evolves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay every time.
    Fixed,
    /// Multiply the delay by `factor` after each poll, up to `max`.
    Exponential {
        /// Growth factor.
        factor: f64,
        /// Upper bound for the delay.
        max: Duration,
    },
}

impl Backoff {
    /// Delay to use after `current`.
    pub fn next(&self, current: Duration) -> Duration {
        let next = match *self {
            Self::Fixed => current,
            Self::Exponential { factor, max } => current.mul_f64(factor.max(1.0)).min(max),
        };
        next.max(MIN_POLL_INTERVAL)
    }
}

/// Polling configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    /// Total time budget for one task.
    pub timeout: Duration,
    /// Delay before the second poll.
    pub interval: Duration,
    /// Delay growth policy.
    pub backoff: Backoff,
    /// Consecutive transport failures retried per poll.
    pub transport_retries: u32,
    /// Statuses that end the wait with [`Error::TaskFailed`].
    pub failure_states: Vec<TaskStatus>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
            backoff: Backoff::Fixed,
            transport_retries: DEFAULT_TRANSPORT_RETRIES,
            failure_states: vec![
                TaskStatus::Terminal,
                TaskStatus::Failed,
                TaskStatus::Canceled,
                TaskStatus::Stopped,
            ],
        }
    }
}

impl WaitConfig {
    /// Set the time budget.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the initial poll interval.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the backoff policy.
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the transport retry bound.
    #[must_use]
    pub fn transport_retries(mut self, retries: u32) -> Self {
        self.transport_retries = retries;
        self
    }

    /// Initial interval, clamped to [`MIN_POLL_INTERVAL`].
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Polls a task until it reaches a terminal status.
pub struct TaskWaiter<'a, G: Gate + ?Sized> {
    gate: &'a G,
    config: &'a WaitConfig,
    cancel: Option<&'a CancelToken>,
}

impl<'a, G: Gate + ?Sized> TaskWaiter<'a, G> {
    /// Create a waiter.
    pub fn new(gate: &'a G, config: &'a WaitConfig) -> Self {
        Self {
            gate,
            config,
            cancel: None,
        }
    }

    /// Observe a cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Block until the task succeeds, fails, times out or is cancelled.
    ///
    /// Transport failures are retried on the regular poll schedule, so the
    /// time budget and the cancel token bound retries as well.
    pub fn await_task(&self, task: &TaskRef) -> Result<()> {
        let started = Instant::now();
        let mut budget = RetryBudget::new(self.config.transport_retries);
        let label = format!("poll task {task}");
        let callback = LogCallback { label: &label };
        let mut delay = self.config.effective_interval();
        let mut polls: u32 = 0;

        loop {
            if self.cancel.is_some_and(CancelToken::is_cancelled) {
                log::debug!("task {task}: cancelled after {polls} polls");
                return Err(Error::Cancelled {
                    task: task.id().to_string(),
                });
            }

            polls += 1;
            match self.poll(task) {
                Ok(state) => {
                    budget.reset();
                    log::trace!("task {task}: poll {polls} -> {}", state.status);

                    if state.status.is_success() {
                        log::debug!("task {task}: succeeded after {polls} polls");
                        return Ok(());
                    }

                    if self.config.failure_states.contains(&state.status) {
                        let reason = state.failure_reason().unwrap_or_else(|| {
                            format!("task ended with status {}", state.status)
                        });
                        return Err(Error::TaskFailed {
                            task: task.id().to_string(),
                            reason,
                        });
                    }
                }
                Err(err) => {
                    if !budget.allow_retry(&err) {
                        return Err(err);
                    }
                    callback.on_retry(budget.consecutive(), budget.max_attempts(), &err, delay);
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= self.config.timeout {
                return Err(Error::Timeout {
                    task: task.id().to_string(),
                    elapsed,
                });
            }

            thread::sleep(delay.min(self.config.timeout - elapsed));
            delay = self.config.backoff.next(delay);
        }
    }

    fn poll(&self, task: &TaskRef) -> Result<TaskState> {
        let response = self.gate.send(&GateRequest::get(task.status_path()))?;
        if response.status != 200 {
            return Err(Error::unexpected(&response));
        }
        Ok(response.json_as::<TaskState>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekit::{Method, MockGate};

    const TASK_PATH: &str = "/tasks/01H";

    fn fast() -> WaitConfig {
        WaitConfig::default()
            .interval(Duration::from_millis(1))
            .timeout(Duration::from_secs(5))
    }

    fn task() -> TaskRef {
        TaskRef::new(TASK_PATH)
    }

    fn status(mock: &MockGate, status: &str) {
        mock.on(
            Method::Get,
            TASK_PATH,
            200,
            &format!(r#"{{"status": "{status}"}}"#),
        );
    }

    #[test]
    fn test_succeeds_after_exactly_three_polls() {
        let mock = MockGate::new();
        status(&mock, "RUNNING");
        status(&mock, "RUNNING");
        status(&mock, "SUCCEEDED");

        let config = fast();
        TaskWaiter::new(&mock, &config).await_task(&task()).unwrap();
        assert_eq!(mock.calls_to(Method::Get, TASK_PATH).len(), 3);
    }

    #[test]
    fn test_terminal_status_fails_with_reason() {
        let mock = MockGate::new();
        mock.on(
            Method::Get,
            TASK_PATH,
            200,
            r#"{"status": "TERMINAL", "variables": [{"key": "exception", "value": {"details": {"errors": ["application already exists"]}}}]}"#,
        );

        let config = fast();
        let err = TaskWaiter::new(&mock, &config)
            .await_task(&task())
            .unwrap_err();
        match err {
            Error::TaskFailed { task, reason } => {
                assert_eq!(task, "01H");
                assert_eq!(reason, "application already exists");
            }
            other => panic!("expected TaskFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_without_reason_reports_status() {
        let mock = MockGate::new();
        status(&mock, "CANCELED");

        let config = fast();
        let err = TaskWaiter::new(&mock, &config)
            .await_task(&task())
            .unwrap_err();
        assert!(err.to_string().contains("CANCELED"));
    }

    #[test]
    fn test_never_terminal_times_out() {
        let mock = MockGate::new();
        status(&mock, "RUNNING");

        let config = WaitConfig::default()
            .interval(Duration::from_millis(10))
            .timeout(Duration::from_millis(200));
        let err = TaskWaiter::new(&mock, &config)
            .await_task(&task())
            .unwrap_err();

        match err {
            Error::Timeout { elapsed, .. } => assert!(elapsed >= Duration::from_millis(200)),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert!(mock.call_count() > 1);
    }

    #[test]
    fn test_transport_errors_retried_then_escalated() {
        let mock = MockGate::new();
        mock.fail(Method::Get, TASK_PATH, "connection reset");

        let config = fast().transport_retries(2);
        let err = TaskWaiter::new(&mock, &config)
            .await_task(&task())
            .unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(mock.call_count(), 3);
    }

    #[test]
    fn test_transient_transport_error_recovers() {
        let mock = MockGate::new();
        mock.fail(Method::Get, TASK_PATH, "connection reset");
        status(&mock, "SUCCEEDED");

        let config = fast();
        TaskWaiter::new(&mock, &config).await_task(&task()).unwrap();
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn test_unexpected_status_not_retried() {
        let mock = MockGate::new();
        mock.on(Method::Get, TASK_PATH, 503, "unavailable");

        let config = fast();
        let err = TaskWaiter::new(&mock, &config)
            .await_task(&task())
            .unwrap_err();

        assert!(matches!(err, Error::UnexpectedStatus { code: 503, .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_cancelled_before_first_poll() {
        let mock = MockGate::new();
        status(&mock, "RUNNING");

        let token = CancelToken::new();
        token.cancel();

        let config = fast();
        let err = TaskWaiter::new(&mock, &config)
            .with_cancel_token(&token)
            .await_task(&task())
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { .. }));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_transport_retries_stay_within_budget() {
        let mock = MockGate::new();
        mock.fail(Method::Get, TASK_PATH, "connection reset");
        mock.fail(Method::Get, TASK_PATH, "connection reset");
        mock.fail(Method::Get, TASK_PATH, "connection reset");
        status(&mock, "RUNNING");

        let config = WaitConfig::default()
            .interval(Duration::from_millis(100))
            .timeout(Duration::from_millis(100))
            .transport_retries(5);
        let err = TaskWaiter::new(&mock, &config)
            .await_task(&task())
            .unwrap_err();

        match err {
            Error::Timeout { elapsed, .. } => {
                assert!(elapsed >= Duration::from_millis(100));
                assert!(elapsed < Duration::from_millis(400), "overran: {elapsed:?}");
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn test_cancel_honoured_between_transport_retries() {
        let mock = MockGate::new();
        mock.fail(Method::Get, TASK_PATH, "connection reset");

        let token = CancelToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let config = WaitConfig::default()
            .interval(Duration::from_millis(300))
            .timeout(Duration::from_secs(10))
            .transport_retries(10);
        let started = Instant::now();
        let err = TaskWaiter::new(&mock, &config)
            .with_cancel_token(&token)
            .await_task(&task())
            .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, Error::Cancelled { .. }), "got {err:?}");
        assert_eq!(mock.call_count(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        let config = WaitConfig::default().interval(Duration::ZERO);
        assert_eq!(config.effective_interval(), MIN_POLL_INTERVAL);
        assert_eq!(Backoff::Fixed.next(Duration::ZERO), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_exponential_backoff_capped() {
        let backoff = Backoff::Exponential {
            factor: 2.0,
            max: Duration::from_millis(300),
        };
        assert_eq!(
            backoff.next(Duration::from_millis(100)),
            Duration::from_millis(200)
        );
        assert_eq!(
            backoff.next(Duration::from_millis(200)),
            Duration::from_millis(300)
        );
    }
}

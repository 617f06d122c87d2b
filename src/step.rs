//! Retrying step execution with a sticky first failure.
//!
//! A `StepRunner` behaves like a chain of `Result::and_then`: once a step has exhausted its
//! retries the failure is kept and every later `run` call is skipped. Compensation work gets its
//! own runner so that a failed forward path never blocks it.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, error, warn};

use crate::error::{StepError, StepFailure};

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
/// Upper bound for a single wait between attempts.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// How often a step is attempted and how long to wait in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per step; zero is treated as one.
    pub max_retries: u32,
    /// Delay after the first failed attempt; it doubles after each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_retries,
            base_delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Exponential backoff without jitter: `base_delay * 2^i` between consecutive attempts,
    /// capped at `MAX_DELAY`, with no wait after the last attempt.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(MAX_DELAY.max(self.base_delay))
            .with_factor(2.0)
            .with_max_times((self.attempts() - 1) as usize)
    }
}

pub struct StepRunner {
    repository: String,
    policy: RetryPolicy,
    failure: Option<StepFailure>,
}

impl StepRunner {
    pub fn new(repository: impl Into<String>, policy: RetryPolicy) -> Self {
        StepRunner {
            repository: repository.into(),
            policy,
            failure: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        self.failure.as_ref()
    }

    /// Runs `operation` unless an earlier step already failed.
    ///
    /// Returns the operation's value on success and `None` when the step was skipped or ran out
    /// of attempts; in the latter case the error becomes this runner's sticky failure.
    pub async fn run<T, E, F, Fut>(&mut self, step: &str, mut operation: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<StepError>,
    {
        if self.failed() {
            debug!(step, repository = %self.repository, "skipped after earlier failure");
            return None;
        }

        let attempts = self.policy.attempts();
        let repository = self.repository.as_str();
        debug!(step, repository, "running");

        let attempt = || {
            let pending = operation();
            async move { pending.await.map_err(Into::<StepError>::into) }
        };
        let mut retries = 0u32;
        let outcome = attempt
            .retry(self.policy.backoff())
            .sleep(tokio::time::sleep)
            .notify(|err: &StepError, delay: Duration| {
                retries += 1;
                warn!(
                    step,
                    repository,
                    retry = retries,
                    max_retries = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying"
                );
            })
            .await;

        match outcome {
            Ok(value) => {
                debug!(step, repository, retries, "done");
                Some(value)
            }
            Err(err) => {
                error!(
                    step,
                    repository,
                    retries = retries + 1,
                    error = %err,
                    "giving up"
                );
                self.failure = Some(StepFailure {
                    step: step.to_string(),
                    repository: self.repository.clone(),
                    source: err,
                });
                None
            }
        }
    }

    pub fn into_result(self) -> Result<(), StepFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

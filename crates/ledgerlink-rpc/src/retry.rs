//! Retry policy and the per-request state machine
//!
//! ```text
//! Pending(n) --ok--------------------------> Success
//! Pending(n) --transient, n < max--(delay)-> Pending(n + 1)
//! Pending(n) --transient, n == max---------> Failed(Exhausted)
//! Pending(n) --permanent-------------------> Failed(Permanent)
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder, Retryable};
use ledgerlink_core::ResilienceConfig;
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{ResilienceError, Result};
use crate::{metrics, CallError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Growth factor per retry; 1.0 keeps the delay constant
    pub multiplier: f64,
    /// Cap on a single delay, before jitter
    pub max_delay: Duration,
    /// Fraction of the delay randomized in both directions, 0.0..=1.0
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryPolicy {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            multiplier: config.backoff_multiplier,
            max_delay: config.max_delay(),
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Exponential schedule without jitter
    ///
    /// backon counts retries, not attempts: `max_attempts = 3` allows two
    /// retries.
    fn exponential(&self) -> ExponentialBuilder {
        ExponentialBuilder::new()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.multiplier as f32)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Jittered delays for each retry this policy allows, in order
    pub fn backoff(&self) -> impl Iterator<Item = Duration> + Send {
        let jitter = self.jitter;
        self.exponential()
            .build()
            .map(move |delay| apply_jitter(delay, jitter))
    }

    /// Delay to wait before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let retry = retry.max(1) as usize;
        let delay = self
            .exponential()
            .with_max_times(retry)
            .build()
            .nth(retry - 1)
            .unwrap_or(self.max_delay);
        apply_jitter(delay, self.jitter)
    }
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 || delay.is_zero() {
        return delay;
    }
    let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
    delay.mul_f64(factor.max(0.0))
}

/// Where a single request stands in its retry lifecycle
#[derive(Debug)]
pub enum RequestState<T> {
    Pending { attempt: u32 },
    Success(T),
    Failed(ResilienceError),
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestState<T> {
    pub fn new() -> Self {
        RequestState::Pending { attempt: 1 }
    }

    /// Attempt number about to run, if still pending
    pub fn attempt(&self) -> Option<u32> {
        match self {
            RequestState::Pending { attempt } => Some(*attempt),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestState::Pending { .. })
    }

    /// Apply the outcome of the current attempt
    ///
    /// Terminal states ignore further outcomes.
    pub fn advance(self, outcome: std::result::Result<T, CallError>, policy: &RetryPolicy) -> Self {
        let attempt = match self {
            RequestState::Pending { attempt } => attempt,
            terminal => return terminal,
        };

        match outcome {
            Ok(value) => RequestState::Success(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                RequestState::Pending {
                    attempt: attempt + 1,
                }
            }
            Err(err) => RequestState::Failed(ResilienceError::from_call(err, attempt)),
        }
    }

    /// In-place variant of [`RequestState::advance`]
    pub fn step(&mut self, outcome: std::result::Result<T, CallError>, policy: &RetryPolicy) {
        let current = std::mem::replace(self, RequestState::Pending { attempt: 0 });
        *self = current.advance(outcome, policy);
    }

    /// Final result; `None` while still pending
    pub fn into_result(self) -> Option<Result<T>> {
        match self {
            RequestState::Pending { .. } => None,
            RequestState::Success(value) => Some(Ok(value)),
            RequestState::Failed(err) => Some(Err(err)),
        }
    }
}

/// Run `call` until it succeeds, fails permanently, or runs out of attempts
///
/// `call` receives the 1-based attempt number. Only transient failures are
/// retried; delays come from the policy's exponential schedule.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, CallError>>,
{
    let attempts = AtomicU32::new(0);
    let jitter = policy.jitter;

    let outcome = (|| {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        call(attempt)
    })
    .retry(policy.exponential())
    .sleep(move |delay| sleep(apply_jitter(delay, jitter)))
    .when(CallError::is_transient)
    .notify(|err: &CallError, delay: Duration| {
        metrics::record_retry(operation);
        debug!(
            operation,
            attempt = attempts.load(Ordering::SeqCst) + 1,
            backoff_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after backoff"
        );
    })
    .await;

    outcome.map_err(|err| {
        let err = ResilienceError::from_call(err, attempts.load(Ordering::SeqCst));
        if err.is_exhausted() {
            metrics::record_exhausted(operation);
            warn!(operation, error = %err, "Retries exhausted");
        }
        err
    })
}

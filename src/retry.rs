use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::GenerationError;
use crate::log_llm_operation;

/// Suspension point used between attempts. Production code sleeps on the tokio timer; tests
/// record the requested delays instead.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Upper bound on cumulative backoff. A retry whose delay would cross it is not taken.
    pub max_total_wait: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_total_wait: Self::default_ceiling(max_attempts, initial_delay),
        }
    }

    pub fn with_max_total_wait(mut self, max_total_wait: Duration) -> Self {
        self.max_total_wait = max_total_wait;
        self
    }

    /// `initial_delay * 2^(max_attempts - 1)`, which never truncates the natural sequence.
    pub fn default_ceiling(max_attempts: u32, initial_delay: Duration) -> Duration {
        let exponent = max_attempts.saturating_sub(1).min(20);
        initial_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// Outcome of a retried call as seen by its caller.
///
/// `Ok(Some(v))` on success, `Ok(None)` when every attempt hit a transient failure (or the wait
/// budget ran out), `Err(e)` for the first permanent failure.
pub type RetryOutcome<T> = Result<Option<T>, GenerationError>;

/// Runs upstream calls with exponential backoff on rate-limit and server-fault errors.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation_name: &str,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut delay = policy.initial_delay;
    let mut waited = Duration::ZERO;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "Upstream call succeeded after retry"
                    );
                }
                return Ok(Some(value));
            }
            Err(e) if e.is_transient() => {
                if attempt == policy.max_attempts {
                    log_llm_operation!(
                        error,
                        operation_name,
                        error = e,
                        retry_count = attempt
                    );
                    break;
                }
                if waited + delay > policy.max_total_wait {
                    warn!(
                        operation = operation_name,
                        attempt,
                        waited_ms = waited.as_millis() as u64,
                        "Backoff budget exhausted, giving up"
                    );
                    break;
                }
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient upstream failure, backing off"
                );
                sleeper.sleep(delay).await;
                waited += delay;
                delay = delay.saturating_mul(2);
            }
            Err(e) => {
                log_llm_operation!(error, operation_name, error = e, retry_count = attempt);
                return Err(e);
            }
        }
    }

    Ok(None)
}

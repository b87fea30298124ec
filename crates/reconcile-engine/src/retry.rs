//! Bounded retry with fixed backoff.
//!
//! Every mutating call goes through [`retry`] (or [`retry_backend`], which classifies
//! [`BackendError`]s for you), so all operation kinds share one set of backoff and
//! budget rules:
//!
//! - attempts are separated by a fixed delay, stretched to honour a retry-after hint;
//! - no attempt is scheduled if its delay would cross the time budget;
//! - cancellation is checked before each attempt and during each delay.

use crate::classify::{BackendError, BackendSignal, ErrorKind};
use crate::error::RetryError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Limits for a retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between attempts.
    pub backoff: Duration,
    /// Overall time budget measured from the first attempt.
    pub max_elapsed: Duration,
    /// Optional cap on the number of attempts.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn new(backoff: Duration, max_elapsed: Duration) -> Self {
        Self {
            backoff,
            max_elapsed,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

/// Run `operation` until it succeeds, fails with an error `is_retryable` rejects, or
/// the policy is exhausted. `operation` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(
    ctx: &CancellationToken,
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    operation: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with(ctx, policy, |e| is_retryable(e).then_some(Duration::ZERO), operation).await
}

/// [`retry`] for backend errors: retries whatever [`ErrorKind::of`] calls Retryable and
/// honours the backend's retry-after hint.
pub async fn retry_backend<T, E, F, Fut>(
    ctx: &CancellationToken,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, RetryError<E>>
where
    E: BackendError,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with(
        ctx,
        policy,
        |e: &E| match ErrorKind::of(e) {
            ErrorKind::Retryable => Some(retry_hint(e)),
            _ => None,
        },
        operation,
    )
    .await
}

fn retry_hint<E: BackendError>(e: &E) -> Duration {
    match e.signal() {
        BackendSignal::Busy { retry_after } => retry_after.unwrap_or_default(),
        _ => Duration::ZERO,
    }
}

/// `decide` returns `Some(hint)` to retry (waiting at least `hint`), `None` to stop.
async fn retry_with<T, E, F, Fut>(
    ctx: &CancellationToken,
    policy: &RetryPolicy,
    decide: impl Fn(&E) -> Option<Duration>,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        if ctx.is_cancelled() {
            return Err(RetryError::Cancelled {
                attempts,
                elapsed: started.elapsed(),
            });
        }

        attempts = attempts.saturating_add(1);
        let source = match operation(attempts).await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempts, elapsed = ?started.elapsed(), "Succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if ctx.is_cancelled() {
            debug!(attempts, error = %source, "Attempt ended by cancellation");
            return Err(RetryError::Cancelled {
                attempts,
                elapsed: started.elapsed(),
            });
        }

        let Some(hint) = decide(&source) else {
            return Err(RetryError::Fatal {
                source,
                attempts,
                elapsed: started.elapsed(),
            });
        };

        let delay = policy.backoff.max(hint);
        let elapsed = started.elapsed();
        let out_of_attempts = policy.max_attempts.is_some_and(|max| attempts >= max);
        if out_of_attempts || elapsed.saturating_add(delay) > policy.max_elapsed {
            warn!(attempts, elapsed = ?elapsed, error = %source, "Retry budget exhausted");
            return Err(RetryError::Exhausted {
                source,
                attempts,
                elapsed,
            });
        }

        warn!(attempts, delay = ?delay, error = %source, "Transient failure, retrying");
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                return Err(RetryError::Cancelled {
                    attempts,
                    elapsed: started.elapsed(),
                });
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Whether a backend error is worth retrying. Handy as the `is_retryable`
/// argument to [`retry`].
pub fn is_transient<E: BackendError>(err: &E) -> bool {
    ErrorKind::of(err) == ErrorKind::Retryable
}

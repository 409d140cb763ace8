//! Retry an arbitrary fallible call until it succeeds or a deadline passes

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tfplug::{Context, ContextError};
use tokio::time::Instant;

use super::backoff::Backoff;

/// Outcome of one failed call, as judged by the caller
#[derive(Debug)]
pub enum RetryableError<E> {
    Retryable(E),
    NonRetryable(E),
}

impl<E> RetryableError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryableError::Retryable(e) | RetryableError::NonRetryable(e) => e,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryContextError<E>
where
    E: fmt::Display + fmt::Debug,
{
    #[error("{0}")]
    NonRetryable(E),

    #[error("timeout after {timeout:?}: {last_error}")]
    Timeout {
        timeout: Duration,
        last_error: String,
    },

    #[error("retry cancelled: {0}")]
    Cancelled(ContextError),
}

/// Call `f` until it returns Ok, a non-retryable error, or time runs out.
///
/// The deadline is the earlier of `now + timeout` and the context deadline.
/// A wait that would end past the deadline is not started.
pub async fn retry_context<T, E, F, Fut>(
    ctx: &Context,
    timeout: Duration,
    backoff: Backoff,
    mut f: F,
) -> Result<T, RetryContextError<E>>
where
    E: fmt::Display + fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryableError<E>>>,
{
    let ctx = ctx.with_timeout(timeout);
    let deadline = ctx.deadline().unwrap_or_else(|| Instant::now() + timeout);
    let mut attempt: u32 = 0;
    let mut previous_error: Option<String> = None;

    loop {
        if let Some(reason) = ctx.err() {
            return Err(match reason {
                ContextError::DeadlineExceeded => RetryContextError::Timeout {
                    timeout,
                    last_error: previous_error.unwrap_or_else(|| reason.to_string()),
                },
                ContextError::Cancelled => RetryContextError::Cancelled(reason),
            });
        }

        let last_error = match f().await {
            Ok(value) => return Ok(value),
            Err(RetryableError::NonRetryable(e)) => {
                return Err(RetryContextError::NonRetryable(e))
            }
            Err(RetryableError::Retryable(e)) => e.to_string(),
        };

        let delay = backoff.delay(attempt);
        attempt = attempt.saturating_add(1);

        if Instant::now() + delay > deadline {
            tracing::debug!(attempts = attempt, "Retry deadline reached: {}", last_error);
            return Err(RetryContextError::Timeout {
                timeout,
                last_error,
            });
        }

        tracing::debug!(
            attempt,
            next_delay = ?delay,
            "Retrying after error: {}",
            last_error
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            reason = ctx.done() => {
                return Err(match reason {
                    ContextError::DeadlineExceeded => {
                        RetryContextError::Timeout { timeout, last_error }
                    }
                    ContextError::Cancelled => RetryContextError::Cancelled(reason),
                });
            }
        }

        previous_error = Some(last_error);
    }
}

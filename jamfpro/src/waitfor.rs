//! Poll until a newly written resource becomes readable

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tfplug::{Context, ContextError};

use crate::crud::backoff::Backoff;
use crate::crud::retry::{retry_context, RetryContextError, RetryableError};

#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: fmt::Display + fmt::Debug,
{
    #[error("error waiting for resource with ID '{id}' to become available: {source}")]
    Unavailable {
        id: String,
        #[source]
        source: RetryContextError<E>,
    },

    #[error("cancelled during stabilization period for resource with ID '{id}': {reason}")]
    Stabilization { id: String, reason: ContextError },
}

/// Call `check` until it stops answering 404/410, then wait out `stabilization`.
///
/// Any other error ends the wait immediately.
pub async fn resource_is_available<T, E, F, Fut>(
    ctx: &Context,
    timeout: Duration,
    id: &str,
    mut check: F,
    stabilization: Duration,
) -> Result<T, WaitError<E>>
where
    E: fmt::Display + fmt::Debug,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    tracing::debug!(
        resource_id = %id,
        timeout = ?timeout,
        "Waiting for resource to become available"
    );

    let resource = retry_context(ctx, timeout, Backoff::jittered_lookup(), || {
        let fut = check(id.to_string());
        async move {
            fut.await.map_err(|e| {
                let text = e.to_string();
                if text.contains("404") || text.contains("410") {
                    RetryableError::Retryable(e)
                } else {
                    RetryableError::NonRetryable(e)
                }
            })
        }
    })
    .await
    .map_err(|source| WaitError::Unavailable {
        id: id.to_string(),
        source,
    })?;

    if !stabilization.is_zero() {
        tracing::debug!(
            resource_id = %id,
            stabilization = ?stabilization,
            "Resource available, waiting for stabilization"
        );

        tokio::select! {
            _ = tokio::time::sleep(stabilization) => {}
            reason = ctx.done() => {
                return Err(WaitError::Stabilization {
                    id: id.to_string(),
                    reason,
                });
            }
        }
    }

    Ok(resource)
}

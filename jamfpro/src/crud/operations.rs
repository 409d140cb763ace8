//! Shared helpers for resource CRUD callbacks

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tfplug::types::Diagnostics;
use tfplug::Context;

use super::backoff::Backoff;
use super::errors::{extract_error_info, is_retryable, OperationKind};
use super::retry::{retry_context, RetryContextError, RetryableError};
use super::state::ResourceData;

/// Retry an API call, deciding retryability from the error text
pub async fn retry_api_call<T, E, F, Fut>(
    ctx: &Context,
    timeout: Duration,
    kind: OperationKind,
    mut call: F,
) -> Result<T, RetryContextError<E>>
where
    E: fmt::Display + fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_context(ctx, timeout, Backoff::jittered_lookup(), || {
        let fut = call();
        async move {
            fut.await.map_err(|e| {
                let info = extract_error_info([e.to_string()]);
                if is_retryable(&info, kind) {
                    RetryableError::Retryable(e)
                } else {
                    tracing::debug!(
                        error_code = %info.error_code,
                        "Non-retryable API error: {}",
                        e
                    );
                    RetryableError::NonRetryable(e)
                }
            })
        }
    })
    .await
}

/// Delete with retries; the id is cleared once the call succeeds
pub async fn delete_with_retry<S, E, F, Fut>(
    ctx: &Context,
    state: &mut S,
    timeout: Duration,
    mut call: F,
) -> Diagnostics
where
    S: ResourceData + ?Sized,
    E: fmt::Display + fmt::Debug,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut diags = Diagnostics::new();
    let id = state.id();

    let result = retry_api_call(ctx, timeout, OperationKind::Write, || call(id.clone())).await;

    match result {
        Ok(()) => {
            tracing::info!(resource_id = %id, "Deleted Jamf Pro resource");
            state.set_id("");
        }
        Err(e) => {
            diags.add_error(
                format!(
                    "failed to delete Jamf Pro resource (ID: {}) after retries: {}",
                    id, e
                ),
                "",
            );
        }
    }

    diags
}

/// Turn a failed read into diagnostics.
///
/// With `cleanup` set, a 404 or 410 clears the id and downgrades the failure
/// to a warning so Terraform drops the resource from state.
pub fn handle_resource_not_found_error<S>(err: &str, state: &mut S, cleanup: bool) -> Diagnostics
where
    S: ResourceData + ?Sized,
{
    let mut diags = Diagnostics::new();

    if cleanup && (err.contains("404") || err.contains("410")) {
        tracing::warn!(resource_id = %state.id(), "Resource not found, removing from state");
        state.set_id("");
        diags.add_warning(
            "Resource not found",
            "The resource was not found on the remote server. It may have been deleted outside of Terraform.",
        );
        return diags;
    }

    diags.add_error("Error reading resource", err);
    diags
}

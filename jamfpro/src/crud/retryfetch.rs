//! Fetch a resource by id, treating a persistent 404/410 as an out-of-band delete

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tfplug::types::Diagnostics;
use tfplug::Context;

use super::backoff::Backoff;
use super::retry::{retry_context, RetryContextError, RetryableError};
use super::state::ResourceData;

/// Look up `id`, retrying every error with jittered backoff until `timeout`.
///
/// When retries run out and the last error mentions 404 or 410 the state id is
/// cleared and only a warning is returned.
pub async fn fetch_by_id<T, S, E, F, Fut>(
    ctx: &Context,
    state: &mut S,
    timeout: Duration,
    id: &str,
    mut api_call: F,
) -> (Option<T>, Diagnostics)
where
    S: ResourceData + ?Sized,
    E: fmt::Display + fmt::Debug,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut diags = Diagnostics::new();

    let result = retry_context(ctx, timeout, Backoff::jittered_lookup(), || {
        let fut = api_call(id.to_string());
        async move { fut.await.map_err(RetryableError::Retryable) }
    })
    .await;

    match result {
        Ok(resource) => (Some(resource), diags),
        Err(RetryContextError::Timeout { last_error, .. })
            if last_error.contains("404") || last_error.contains("410") =>
        {
            tracing::warn!(
                resource_id = %id,
                "Resource not found after retries, removing from state"
            );
            state.set_id("");
            diags.add_warning(
                "Resource not found",
                format!(
                    "The resource with ID '{}' was not found on the Jamf Pro server. It may have been deleted outside of Terraform.",
                    id
                ),
            );
            (None, diags)
        }
        Err(e) => {
            diags.add_error(
                format!(
                    "failed to read resource with ID '{}' after all retries: {}",
                    id, e
                ),
                "",
            );
            (None, diags)
        }
    }
}

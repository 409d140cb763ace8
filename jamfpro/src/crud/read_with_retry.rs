//! Bounded retry loop around a single resource read
//!
//! Jamf Pro is eventually consistent: a resource that was just created or
//! updated can answer 404 (or a stale 409/423) for a while. Every post-write
//! read goes through [`read_with_retry`], which re-issues the read with capped
//! exponential backoff until it succeeds, fails terminally, or runs out of
//! retries or deadline.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tfplug::resource::{
    CreateResourceResponse, ReadResourceRequest, ReadResourceResponse, UpdateResourceResponse,
};
use tfplug::types::{AttributePath, Diagnostics, DynamicValue};
use tfplug::{Context, ContextError};
use tokio::time::Instant;

use super::backoff::Backoff;
use super::errors::{
    classify, extract_error_from_diagnostics, ErrorInfo, OperationKind, ReadDisposition,
};

/// Time that must remain before the deadline for an attempt or wait to start
pub const SAFETY_MARGIN: Duration = Duration::from_secs(1);

pub const DEFAULT_MAX_RETRIES: u32 = 30;
pub const DEFAULT_INITIAL_RETRY_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_RETRY_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ReadWithRetryOptions {
    /// Retries after the first call; 3 means up to 4 calls
    pub max_retries: u32,
    pub initial_retry_interval: Duration,
    pub max_retry_interval: Duration,
    pub backoff_multiplier: f64,
    /// Label for log lines and errors, e.g. "Create" or "Read"
    pub operation: String,
    pub resource_type_name: String,
}

impl Default for ReadWithRetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_retry_interval: DEFAULT_INITIAL_RETRY_INTERVAL,
            max_retry_interval: DEFAULT_MAX_RETRY_INTERVAL,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            operation: "Operation".to_string(),
            resource_type_name: "resource".to_string(),
        }
    }
}

pub fn default_read_with_retry_options() -> ReadWithRetryOptions {
    ReadWithRetryOptions::default()
}

impl ReadWithRetryOptions {
    pub fn for_operation(
        operation: impl Into<String>,
        resource_type_name: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            resource_type_name: resource_type_name.into(),
            ..Self::default()
        }
    }

    /// Replace unusable values with the defaults
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        if self.max_retries == 0 {
            self.max_retries = defaults.max_retries;
        }
        if self.initial_retry_interval.is_zero() {
            self.initial_retry_interval = defaults.initial_retry_interval;
        }
        if self.max_retry_interval.is_zero() {
            self.max_retry_interval = defaults.max_retry_interval;
        }
        // below 1.0 the delays would shrink
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            self.backoff_multiplier = defaults.backoff_multiplier;
        }
        if self.operation.is_empty() {
            self.operation = defaults.operation;
        }
        if self.resource_type_name.is_empty() {
            self.resource_type_name = defaults.resource_type_name;
        }

        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.initial_retry_interval,
            self.max_retry_interval,
            self.backoff_multiplier,
        )
    }
}

/// Passed to the read function on every call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadAttempt {
    pub operation: String,
    /// 1-based
    pub attempt: u32,
}

/// Where the result of a successful read is committed
pub trait StateContainer {
    fn state(&self) -> Option<&DynamicValue>;

    /// `None` records that the resource no longer exists
    fn set_state(&mut self, state: Option<DynamicValue>);
}

impl StateContainer for CreateResourceResponse {
    fn state(&self) -> Option<&DynamicValue> {
        Some(&self.new_state)
    }

    fn set_state(&mut self, state: Option<DynamicValue>) {
        self.new_state = state.unwrap_or_else(DynamicValue::null);
    }
}

impl StateContainer for UpdateResourceResponse {
    fn state(&self) -> Option<&DynamicValue> {
        Some(&self.new_state)
    }

    fn set_state(&mut self, state: Option<DynamicValue>) {
        self.new_state = state.unwrap_or_else(DynamicValue::null);
    }
}

impl StateContainer for ReadResourceResponse {
    fn state(&self) -> Option<&DynamicValue> {
        self.new_state.as_ref()
    }

    fn set_state(&mut self, state: Option<DynamicValue>) {
        self.new_state = state;
    }
}

/// One failed call of the read function
#[derive(Debug, Clone, Error)]
#[error("{operation} attempt {attempt} failed: {diagnostics}")]
pub struct AttemptError {
    pub operation: String,
    pub attempt: u32,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Error)]
pub enum ReadRetryError {
    #[error("context must have a deadline for retry operations")]
    MissingDeadline,

    #[error("insufficient time remaining in context for retry operation")]
    InsufficientTime,

    #[error("context cancelled during retry attempt {attempt}: {source}")]
    Cancelled {
        attempt: u32,
        #[source]
        source: ContextError,
    },

    #[error("context cancelled during retry wait: {0}")]
    CancelledDuringWait(#[source] ContextError),

    #[error("read operation failed with non-retryable error ({info}): {source}")]
    NonRetryable {
        info: ErrorInfo,
        #[source]
        source: AttemptError,
    },

    #[error("failed to read resource state for {resource_type} after {attempts} attempts: {source}")]
    Exhausted {
        resource_type: String,
        attempts: u32,
        #[source]
        source: AttemptError,
    },
}

impl ReadRetryError {
    /// Diagnostics of the last failed attempt, when there was one
    pub fn attempt_diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            ReadRetryError::NonRetryable { source, .. }
            | ReadRetryError::Exhausted { source, .. } => Some(&source.diagnostics),
            _ => None,
        }
    }
}

/// Re-run `read_fn` until it succeeds, then commit its state to `container`.
///
/// The request is seeded from the container's current state when it has one.
/// The container is written exactly once, and only on success.
pub async fn read_with_retry<F, Fut, S>(
    ctx: &Context,
    mut read_fn: F,
    read_req: ReadResourceRequest,
    container: &mut S,
    opts: ReadWithRetryOptions,
) -> Result<(), ReadRetryError>
where
    F: FnMut(Context, ReadResourceRequest, ReadAttempt) -> Fut,
    Fut: Future<Output = ReadResourceResponse>,
    S: StateContainer + ?Sized,
{
    let opts = opts.normalized();

    let deadline = ctx.deadline().ok_or(ReadRetryError::MissingDeadline)?;
    if deadline.saturating_duration_since(Instant::now()) <= SAFETY_MARGIN {
        return Err(ReadRetryError::InsufficientTime);
    }

    let mut request = read_req;
    if let Some(state) = container.state() {
        if !state.is_null() {
            request.current_state = state.clone();
        }
    }

    let resource_id = request
        .current_state
        .get_string(&AttributePath::new("id"))
        .unwrap_or_default();
    let backoff = opts.backoff();
    let max_calls = opts.max_retries.saturating_add(1);

    tracing::debug!(
        resource_id = %resource_id,
        resource_type = %opts.resource_type_name,
        operation = %opts.operation,
        max_retries = opts.max_retries,
        "Starting read with retry"
    );

    let mut attempt: u32 = 0;
    let failure = loop {
        attempt += 1;

        if let Some(reason) = ctx.err() {
            return Err(ReadRetryError::Cancelled {
                attempt,
                source: reason,
            });
        }

        tracing::debug!(
            resource_id = %resource_id,
            resource_type = %opts.resource_type_name,
            attempt,
            "Read attempt"
        );

        let response = read_fn(
            ctx.clone(),
            request.clone(),
            ReadAttempt {
                operation: opts.operation.clone(),
                attempt,
            },
        )
        .await;

        if !response.diagnostics.has_error() {
            for warning in response.diagnostics.warnings() {
                tracing::warn!(resource_id = %resource_id, "{}", warning);
            }

            tracing::info!(
                resource_id = %resource_id,
                resource_type = %opts.resource_type_name,
                attempts = attempt,
                "Read with retry succeeded"
            );

            container.set_state(response.new_state);
            return Ok(());
        }

        let info = extract_error_from_diagnostics(&response.diagnostics);
        let error = AttemptError {
            operation: opts.operation.clone(),
            attempt,
            diagnostics: response.diagnostics,
        };

        if classify(&info, OperationKind::Read) == ReadDisposition::Terminal {
            tracing::error!(
                resource_id = %resource_id,
                resource_type = %opts.resource_type_name,
                status_code = info.status_code,
                error_code = %info.error_code,
                attempt,
                "Read failed with non-retryable error"
            );
            return Err(ReadRetryError::NonRetryable {
                info,
                source: error,
            });
        }

        if attempt >= max_calls {
            break error;
        }

        let delay = backoff.base_delay(attempt - 1);
        if Instant::now() + delay + SAFETY_MARGIN > deadline {
            tracing::warn!(
                resource_id = %resource_id,
                next_delay = ?delay,
                "Not enough time left before deadline for another attempt"
            );
            break error;
        }

        tracing::info!(
            resource_id = %resource_id,
            resource_type = %opts.resource_type_name,
            status_code = info.status_code,
            error_code = %info.error_code,
            attempt,
            next_delay = ?delay,
            "Retryable read error, waiting before next attempt"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            reason = ctx.done() => return Err(ReadRetryError::CancelledDuringWait(reason)),
        }
    };

    tracing::error!(
        resource_id = %resource_id,
        resource_type = %opts.resource_type_name,
        attempts = attempt,
        error = %failure,
        "Read with retry exhausted"
    );

    Err(ReadRetryError::Exhausted {
        resource_type: opts.resource_type_name,
        attempts: attempt,
        source: failure,
    })
}

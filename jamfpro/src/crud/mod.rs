//! Retry and error-handling core shared by every resource

pub mod backoff;
pub mod errors;
pub mod operations;
pub mod read_with_retry;
pub mod retry;
pub mod retryfetch;
pub mod state;
pub mod timeout;

pub use backoff::Backoff;
pub use errors::{ErrorInfo, OperationKind, ReadDisposition};
pub use read_with_retry::{
    read_with_retry, ReadAttempt, ReadRetryError, ReadWithRetryOptions, StateContainer,
};
pub use state::ResourceData;

//! Context implementation for deadlines and cancellation
//!
//! This module provides the Context type which carries a deadline and a
//! cancellation signal across async boundaries. Child contexts inherit the
//! parent's deadline and observe the parent's cancellation.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};

/// Reason a context is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Context carries the deadline and cancellation signal of one operation
/// CRITICAL: Pass this as first parameter to ALL async trait methods
/// Cloning is cheap and every clone observes the same cancellation
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    parent: Option<Context>,
    done: watch::Receiver<Option<ContextError>>,
    done_tx: watch::Sender<Option<ContextError>>,
}

impl Context {
    /// Root context with no deadline
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Child context that expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context that expires at `deadline`, or earlier if the parent does
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.inner.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self::build(Some(deadline), Some(self.clone()))
    }

    /// Child context without its own deadline, cancellable independently
    pub fn with_cancel(&self) -> Self {
        Self::build(self.inner.deadline, Some(self.clone()))
    }

    fn build(deadline: Option<Instant>, parent: Option<Context>) -> Self {
        let (done_tx, done_rx) = watch::channel(None);

        Self {
            inner: Arc::new(ContextInner {
                deadline,
                parent,
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Why this context is done, or None while it is still live
    pub fn err(&self) -> Option<ContextError> {
        if let Some(reason) = *self.inner.done.borrow() {
            return Some(reason);
        }

        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return Some(ContextError::DeadlineExceeded);
            }
        }

        self.inner.parent.as_ref().and_then(|parent| parent.err())
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves when the context is cancelled or its deadline passes
    pub fn done(&self) -> BoxFuture<'_, ContextError> {
        Box::pin(async move {
            if let Some(reason) = self.err() {
                return reason;
            }

            let mut rx = self.inner.done.clone();
            let own = wait_for_signal(&mut rx);

            let deadline = async {
                match self.inner.deadline {
                    Some(deadline) => {
                        time::sleep_until(deadline).await;
                        ContextError::DeadlineExceeded
                    }
                    None => std::future::pending().await,
                }
            };

            let parent = async {
                match &self.inner.parent {
                    Some(parent) => parent.done().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                reason = own => reason,
                reason = deadline => reason,
                reason = parent => reason,
            }
        })
    }

    /// Cancel this context and every context derived from it
    pub fn cancel(&self) {
        self.inner.done_tx.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(ContextError::Cancelled);
                true
            } else {
                false
            }
        });
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("err", &self.err())
            .finish()
    }
}

async fn wait_for_signal(rx: &mut watch::Receiver<Option<ContextError>>) -> ContextError {
    let signal = rx.wait_for(Option::is_some).await.map(|reason| *reason);
    match signal {
        Ok(reason) => reason.unwrap_or(ContextError::Cancelled),
        // sender lives as long as the context, so this only happens on teardown
        Err(_) => std::future::pending().await,
    }
}

//! Request-scoped cancellation and deadlines.
//!
//! A [`RequestContext`] travels with every operation. Cloning it shares the
//! same cancellation token, [`RequestContext::with_timeout`] derives a child
//! whose deadline is the earlier of the parent's and the new one.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::ErrorKind;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing token, e.g. the process shutdown token.
    #[must_use]
    pub const fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derives a child context that also ends after `timeout`.
    ///
    /// Cancelling the parent cancels the child, not the other way around.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(current) if current < candidate => current,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels this context, and every child, once the guard is dropped.
    #[must_use]
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reports why the context has ended, if it has.
    #[must_use]
    pub fn err(&self) -> Option<ErrorKind> {
        if self.token.is_cancelled() {
            return Some(ErrorKind::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ErrorKind::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ErrorKind {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => ErrorKind::Canceled,
                    () = tokio::time::sleep_until(deadline) => ErrorKind::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ErrorKind::Canceled
            }
        }
    }

    /// Drives `fut` until it completes or the context ends.
    ///
    /// An already-ended context wins over a ready future.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ErrorKind>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            kind = self.done() => Err(kind),
            output = fut => Ok(output),
        }
    }
}

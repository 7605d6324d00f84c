// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Caller supplied cancellation and deadlines.
//!
//! A [`Context`] travels with every blocking call. It is cancelled either
//! explicitly, through the [`CancellationToken`] handed out by
//! [`Context::with_cancel`], or implicitly once its deadline passes. Derived
//! contexts inherit both the parent's token and the earlier of the two
//! deadlines.

use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a context that is cancelled when the returned token is, or
    /// when `self` is.
    pub fn with_cancel(&self) -> (Self, CancellationToken) {
        let token = self.token.child_token();
        (
            Self {
                token: token.clone(),
                deadline: self.deadline,
            },
            token,
        )
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: Some(match self.deadline {
                Some(current) => current.min(deadline),
                None => deadline,
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason this context is done, or `None` while it is live.
    /// Never blocks.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            Some(ContextError::Cancelled)
        } else if self.deadline.is_some_and(|d| d <= Instant::now()) {
            Some(ContextError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => ContextError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }

    /// Drives `fut` until it completes or the context is done, whichever
    /// comes first. Cancellation wins when both are ready.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ContextError> {
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            output = fut => Ok(output),
        }
    }
}

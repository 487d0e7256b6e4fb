// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Per-request deadline and cancellation
//!
//! Every store call and dataset computation made on behalf of a query runs
//! through [`RequestContext::run`], which races the operation against the
//! caller's cancellation signal and the tighter of the caller's deadline and
//! the operation's own budget.
//!
//! # Examples
//!
//! ```rust,ignore
//! use emissions_cache::{cancellation, RequestContext};
//! use std::time::Duration;
//!
//! let (handle, signal) = cancellation();
//! let ctx = RequestContext::new()
//!     .with_timeout(Duration::from_secs(2))
//!     .with_cancellation(signal);
//!
//! // Elsewhere, e.g. when the client disconnects:
//! handle.cancel();
//! ```

use std::future::{pending, Future};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why an operation run under a [`RequestContext`] did not finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupted {
    /// The request was cancelled
    Cancelled,
    /// The effective deadline passed; carries the budget that applied
    DeadlineExceeded(Duration),
}

/// Sending half of a cancellation pair
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel every context holding the paired signal
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving half of a cancellation pair; cheap to clone
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested; never resolves if the handle
    /// is dropped without cancelling
    async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            pending::<()>().await;
        }
    }
}

/// Create a linked cancellation handle and signal
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Caller-supplied bounds for one query
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: Option<CancelSignal>,
}

impl RequestContext {
    /// A context with no deadline and no cancellation
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the whole request to `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Bound the whole request to an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a cancellation signal
    pub fn with_cancellation(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Whether the attached signal (if any) has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled)
    }

    /// Run `op` bounded by this context and an operation budget.
    ///
    /// The effective deadline is the earlier of the context deadline and
    /// `now + budget`. Each poll checks cancellation, then the deadline,
    /// then the operation.
    pub(crate) async fn run<F>(&self, budget: Duration, op: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        let now = Instant::now();
        let op_deadline = now + budget;
        let (deadline, applied) = match self.deadline {
            Some(ctx_deadline) if ctx_deadline < op_deadline => {
                (ctx_deadline, ctx_deadline.saturating_duration_since(now))
            }
            _ => (op_deadline, budget),
        };

        let cancelled = async {
            match &self.cancel {
                Some(signal) => signal.cancelled().await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(Interrupted::Cancelled),
            _ = tokio::time::sleep_until(deadline) => Err(Interrupted::DeadlineExceeded(applied)),
            output = op => Ok(output),
        }
    }
}

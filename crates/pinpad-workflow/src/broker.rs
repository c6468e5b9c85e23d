//! Cancellation broker.
//!
//! Every device call made by the engine runs through
//! [`CancellationBroker::execute_with_timeout`], which races the call against
//! a deadline and an external [`CancellationToken`]. The losing side is
//! dropped and its child token cancelled, so a stalled serial read never
//! stalls the request pipeline and an abandoned call never keeps running.
//!
//! The broker never returns an error and never lets a panic escape: the
//! outcome is always one of [`BrokerOutcome`]'s variants.
//!
//! # Examples
//!
//! ```
//! use pinpad_workflow::broker::{BrokerOutcome, CancellationBroker};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let broker = CancellationBroker::new();
//!     let outcome = broker
//!         .execute_with_timeout(
//!             |_cancel| async { Ok::<_, pinpad_hardware::HardwareError>(42) },
//!             Duration::from_secs(1),
//!             &CancellationToken::new(),
//!         )
//!         .await;
//!
//!     assert!(matches!(outcome, BrokerOutcome::Success(42)));
//! }
//! ```

use futures::FutureExt;
use pinpad_hardware::HardwareError;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of a brokered device call.
#[derive(Debug)]
pub enum BrokerOutcome<T> {
    /// The call finished in time.
    Success(T),

    /// The deadline elapsed first.
    TimedOut,

    /// The external token fired first.
    Cancelled,

    /// The call failed or panicked.
    Faulted(HardwareError),
}

impl<T> BrokerOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Convert into the success value, if any.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Executor that bounds device calls by a timeout and a cancellation token.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancellationBroker;

impl CancellationBroker {
    pub fn new() -> Self {
        Self
    }

    /// Run `operation` until it finishes, `timeout` elapses or `cancel` fires.
    ///
    /// The operation receives a child of `cancel`; the child is cancelled
    /// whenever the operation does not win the race.
    pub async fn execute_with_timeout<T, F, Fut>(
        &self,
        operation: F,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> BrokerOutcome<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = pinpad_hardware::Result<T>>,
    {
        if cancel.is_cancelled() {
            return BrokerOutcome::Cancelled;
        }

        let child = cancel.child_token();
        let started = match std::panic::catch_unwind(AssertUnwindSafe(|| operation(child.clone())))
        {
            Ok(future) => future,
            Err(panic) => return BrokerOutcome::Faulted(panic_fault(panic)),
        };
        let guarded = AssertUnwindSafe(started).catch_unwind();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => BrokerOutcome::Cancelled,
            result = tokio::time::timeout(timeout, guarded) => match result {
                Err(_) => BrokerOutcome::TimedOut,
                Ok(Err(panic)) => BrokerOutcome::Faulted(panic_fault(panic)),
                Ok(Ok(Err(HardwareError::Cancelled { .. }))) if cancel.is_cancelled() => {
                    BrokerOutcome::Cancelled
                }
                Ok(Ok(Err(err))) => BrokerOutcome::Faulted(err),
                Ok(Ok(Ok(value))) => BrokerOutcome::Success(value),
            },
        };

        if !outcome.is_success() {
            child.cancel();
        }

        match &outcome {
            BrokerOutcome::TimedOut => {
                tracing::debug!(timeout_ms = timeout.as_millis() as u64, "device call timed out");
            }
            BrokerOutcome::Cancelled => tracing::debug!("device call cancelled"),
            BrokerOutcome::Faulted(err) => tracing::debug!(error = %err, "device call faulted"),
            BrokerOutcome::Success(_) => {}
        }

        outcome
    }
}

fn panic_fault(panic: Box<dyn Any + Send>) -> HardwareError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    HardwareError::other(format!("device call panicked: {message}"))
}

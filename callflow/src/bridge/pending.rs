//! Awaitable handle over a callback-style operation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::latch::{Latch, LatchState};
use crate::cancellation::CancellationToken;
use crate::errors::{CallflowError, CancelReason};

/// Cancels an in-flight operation on the producing side.
///
/// Invoked at most once per submitted operation, and only when the awaiting
/// side gave up before any outcome arrived.
#[cfg_attr(test, mockall::automock)]
pub trait CancelHandle: Send + Sync {
    /// Asks the producer to stop working on the operation.
    fn cancel(&self);
}

impl<F> CancelHandle for F
where
    F: Fn() + Send + Sync,
{
    fn cancel(&self) {
        self()
    }
}

/// A producer that reports its outcome through callbacks.
///
/// `submit` hands the producer a [`Completion`] and must return a handle that
/// aborts the operation. The producer may complete from any thread, at any
/// time, any number of times; only the first outcome counts.
pub trait CallbackTransport<T, E>: Send {
    /// Starts the operation.
    fn submit(self, completion: Completion<T, E>) -> Box<dyn CancelHandle>;
}

impl<T, E, F, H> CallbackTransport<T, E> for F
where
    F: FnOnce(Completion<T, E>) -> H + Send,
    H: CancelHandle + 'static,
{
    fn submit(self, completion: Completion<T, E>) -> Box<dyn CancelHandle> {
        Box::new(self(completion))
    }
}

/// The producer's side of a pending operation.
///
/// Cheap to clone; every clone feeds the same single-resolution latch.
pub struct Completion<T, E> {
    latch: Arc<Latch<T, E>>,
}

impl<T, E> Clone for Completion<T, E> {
    fn clone(&self) -> Self {
        Self {
            latch: Arc::clone(&self.latch),
        }
    }
}

impl<T, E> Completion<T, E> {
    /// Delivers a value. Returns false if an outcome or cancellation already
    /// closed the latch, in which case `value` is discarded.
    pub fn success(&self, value: T) -> bool {
        let delivered = self.latch.resolve(Ok(value));
        if !delivered {
            trace!("Discarding success for a closed operation");
        }
        delivered
    }

    /// Delivers a failure. Returns false if the latch was already closed.
    pub fn failure(&self, error: E) -> bool {
        let delivered = self.latch.resolve(Err(error));
        if !delivered {
            trace!("Discarding failure for a closed operation");
        }
        delivered
    }

    /// Current state of the latch.
    #[must_use]
    pub fn state(&self) -> LatchState {
        self.latch.state()
    }
}

impl<T, E> std::fmt::Debug for Completion<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("state", &self.state())
            .finish()
    }
}

/// Outcome of awaiting a [`PendingCall`].
#[derive(Debug, Error)]
pub enum BridgeError<E: std::error::Error + 'static> {
    /// The producer reported failure.
    #[error("Operation failed: {0}")]
    Failed(#[source] E),

    /// The awaiter gave up before an outcome arrived.
    #[error("Operation cancelled: {0}")]
    Cancelled(CancelReason),
}

impl<E: std::error::Error + 'static> BridgeError<E> {
    /// Returns true if the awaiter cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl<E> From<BridgeError<E>> for CallflowError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: BridgeError<E>) -> Self {
        match error {
            BridgeError::Failed(source) => Self::Transport(source.into()),
            BridgeError::Cancelled(reason) => Self::Cancelled(reason),
        }
    }
}

/// Starts `transport` and returns a future for its first outcome.
///
/// There is no built-in timeout; the future stays pending until the producer
/// completes or the caller gives up. Dropping the future before an outcome
/// arrives cancels the operation.
pub fn submit<T, E, P>(transport: P) -> PendingCall<T, E>
where
    P: CallbackTransport<T, E>,
{
    let (latch, receiver) = Latch::open();
    let latch = Arc::new(latch);
    let cancel_handle = transport.submit(Completion {
        latch: Arc::clone(&latch),
    });

    PendingCall {
        receiver,
        latch,
        cancel_handle: Some(cancel_handle),
        cancel_reason: None,
        finished: false,
    }
}

/// The awaiting side of a callback-style operation.
#[must_use = "dropping a PendingCall cancels the operation"]
pub struct PendingCall<T, E> {
    receiver: oneshot::Receiver<Result<T, E>>,
    latch: Arc<Latch<T, E>>,
    cancel_handle: Option<Box<dyn CancelHandle>>,
    cancel_reason: Option<CancelReason>,
    finished: bool,
}

impl<T, E> PendingCall<T, E> {
    /// Current state of the latch.
    #[must_use]
    pub fn state(&self) -> LatchState {
        self.latch.state()
    }

    /// Cancels the operation if no outcome has arrived yet.
    ///
    /// Returns true if this call won the race, in which case the producer's
    /// cancel handle has been invoked and awaiting yields `Cancelled`.
    pub fn cancel(&mut self, reason: impl Into<CancelReason>) -> bool {
        if !self.latch.cancel() {
            return false;
        }
        let reason = reason.into();
        debug!(%reason, "Cancelling pending operation");
        self.cancel_reason = Some(reason);
        if let Some(handle) = self.cancel_handle.take() {
            handle.cancel();
        }
        true
    }
}

impl<T, E> PendingCall<T, E>
where
    E: std::error::Error + 'static,
{
    /// Awaits the outcome, cancelling the operation if `token` fires first.
    pub async fn cancel_on(mut self, token: &CancellationToken) -> Result<T, BridgeError<E>> {
        let reason = tokio::select! {
            biased;
            outcome = &mut self => return outcome,
            reason = token.cancelled() => reason,
        };
        self.abandon(reason).await
    }

    /// Awaits the outcome for at most `after`.
    pub async fn timeout(mut self, after: Duration) -> Result<T, BridgeError<E>> {
        match tokio::time::timeout(after, &mut self).await {
            Ok(outcome) => outcome,
            Err(_) => self.abandon(CancelReason::Timeout(after)).await,
        }
    }

    async fn abandon(&mut self, reason: CancelReason) -> Result<T, BridgeError<E>> {
        if self.cancel(reason.clone()) {
            return Err(BridgeError::Cancelled(reason));
        }
        // An outcome closed the latch first; it is already on its way.
        (&mut *self).await
    }
}

impl<T, E> Future for PendingCall<T, E>
where
    E: std::error::Error + 'static,
{
    type Output = Result<T, BridgeError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(outcome)) => {
                this.finished = true;
                Poll::Ready(outcome.map_err(BridgeError::Failed))
            }
            Poll::Ready(Err(_)) => {
                this.finished = true;
                let reason = this
                    .cancel_reason
                    .clone()
                    .unwrap_or_else(|| CancelReason::from("operation abandoned"));
                Poll::Ready(Err(BridgeError::Cancelled(reason)))
            }
        }
    }
}

impl<T, E> Drop for PendingCall<T, E> {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel("awaiter dropped");
        }
    }
}

impl<T, E> std::fmt::Debug for PendingCall<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("state", &self.state())
            .field("finished", &self.finished)
            .finish()
    }
}

//! Bridging callback-style operations into awaitable futures.
//!
//! A producer is started with a [`Completion`] it can resolve from any
//! thread. The awaiting side holds a [`PendingCall`]. Exactly one of three
//! things closes the shared latch:
//!
//! - a success, delivered to the awaiter
//! - a failure, delivered to the awaiter as [`BridgeError::Failed`]
//! - cancellation by the awaiter, which invokes the producer's
//!   [`CancelHandle`] once
//!
//! Anything arriving after the latch closed is discarded.

mod latch;
mod pending;

pub use latch::LatchState;
pub use pending::{submit, BridgeError, CallbackTransport, CancelHandle, Completion, PendingCall};

#[cfg(test)]
pub(crate) use pending::MockCancelHandle;

//! Cooperative cancellation for calls and pending operations.

mod token;

pub use token::{CancelCallback, CancellationToken};

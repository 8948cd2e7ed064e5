//! Diagnostic context propagation.
//!
//! Tags such as the correlation id live in two places:
//! - on [`crate::context::CallContext::diagnostics`], passed explicitly, and
//! - in a thread-scoped ambient mapping read by logging code that has no
//!   access to the call.
//!
//! The ambient mapping is kept correct across `.await` points by
//! [`WithDiagnostics`], which swaps the task's tags in and out around every
//! poll.

mod ambient;
mod propagate;

pub use ambient::{
    clear, current, enter, exit, get, put, remove, DiagnosticScope, DiagnosticSnapshot,
    DiagnosticTags,
};
pub use propagate::{propagate, with_diagnostics, WithDiagnostics};

//! A callback transport driven by the test.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::bridge::{CallbackTransport, CancelHandle, Completion};

/// Holds on to the completion it receives so the test decides when, and
/// how, the operation finishes. Counts producer-side cancellations.
pub struct ScriptedTransport<T, E> {
    completion: Arc<Mutex<Option<Completion<T, E>>>>,
    cancels: Arc<AtomicUsize>,
}

impl<T, E> Clone for ScriptedTransport<T, E> {
    fn clone(&self) -> Self {
        Self {
            completion: Arc::clone(&self.completion),
            cancels: Arc::clone(&self.cancels),
        }
    }
}

impl<T, E> Default for ScriptedTransport<T, E> {
    fn default() -> Self {
        Self {
            completion: Arc::new(Mutex::new(None)),
            cancels: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl<T, E> ScriptedTransport<T, E> {
    /// Creates a transport that has not been submitted yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once an operation was submitted.
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.completion.lock().is_some()
    }

    /// Completes with `value`. False if nothing was submitted or the latch
    /// was already closed.
    pub fn succeed(&self, value: T) -> bool {
        self.completion
            .lock()
            .as_ref()
            .is_some_and(|completion| completion.success(value))
    }

    /// Completes with `error`.
    pub fn fail(&self, error: E) -> bool {
        self.completion
            .lock()
            .as_ref()
            .is_some_and(|completion| completion.failure(error))
    }

    /// How many times the cancel handle ran.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

struct CountingCancel(Arc<AtomicUsize>);

impl CancelHandle for CountingCancel {
    fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: Send, E: Send> CallbackTransport<T, E> for ScriptedTransport<T, E> {
    fn submit(self, completion: Completion<T, E>) -> Box<dyn CancelHandle> {
        *self.completion.lock() = Some(completion);
        Box::new(CountingCancel(Arc::clone(&self.cancels)))
    }
}

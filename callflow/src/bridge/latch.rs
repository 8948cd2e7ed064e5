//! Single-resolution latch.
//!
//! The latch owns the sending half of a one-shot channel while it is open.
//! Resolving or cancelling takes that sender out; whoever takes it wins, and
//! everybody after them finds the latch closed.

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Observable state of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    /// Nothing has happened yet.
    Pending,
    /// A success or failure was delivered.
    Resolved,
    /// The awaiting side cancelled first.
    Cancelled,
}

enum Slot<T, E> {
    Open(oneshot::Sender<Result<T, E>>),
    Resolved,
    Cancelled,
}

pub(crate) struct Latch<T, E> {
    slot: Mutex<Slot<T, E>>,
}

impl<T, E> Latch<T, E> {
    pub(crate) fn open() -> (Self, oneshot::Receiver<Result<T, E>>) {
        let (sender, receiver) = oneshot::channel();
        let latch = Self {
            slot: Mutex::new(Slot::Open(sender)),
        };
        (latch, receiver)
    }

    /// Delivers `outcome` if the latch is still open.
    pub(crate) fn resolve(&self, outcome: Result<T, E>) -> bool {
        let Some(sender) = self.close(Slot::Resolved) else {
            return false;
        };
        // The receiver only disappears with its awaiter, and the awaiter
        // cancels the latch before letting go of it.
        let _ = sender.send(outcome);
        true
    }

    /// Closes the latch as cancelled if it is still open.
    pub(crate) fn cancel(&self) -> bool {
        self.close(Slot::Cancelled).is_some()
    }

    pub(crate) fn state(&self) -> LatchState {
        match &*self.slot.lock() {
            Slot::Open(_) => LatchState::Pending,
            Slot::Resolved => LatchState::Resolved,
            Slot::Cancelled => LatchState::Cancelled,
        }
    }

    fn close(&self, terminal: Slot<T, E>) -> Option<oneshot::Sender<Result<T, E>>> {
        let mut slot = self.slot.lock();
        if !matches!(&*slot, Slot::Open(_)) {
            return None;
        }
        match std::mem::replace(&mut *slot, terminal) {
            Slot::Open(sender) => Some(sender),
            Slot::Resolved | Slot::Cancelled => None,
        }
    }
}

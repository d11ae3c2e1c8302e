//! A settable future with explicit resolve/reject controls.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use rill_core::FlowError;

struct Slot<T> {
    outcome: Option<Result<T, FlowError>>,
    waker: Option<Waker>,
    settled: bool,
}

/// The settling half of a deferred: resolve or reject exactly once.
///
/// Once settled, further calls are no-ops. Dropping an unsettled handle
/// rejects the observer with [`FlowError::Disconnected`].
pub struct Deferred<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// The observing half of a deferred.
pub struct DeferredFuture<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// Create a settling/observing pair.
pub fn deferred<T>() -> (Deferred<T>, DeferredFuture<T>) {
    let slot = Rc::new(RefCell::new(Slot {
        outcome: None,
        waker: None,
        settled: false,
    }));
    (Deferred { slot: slot.clone() }, DeferredFuture { slot })
}

impl<T> Deferred<T> {
    /// Settle with a value.
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Settle with an error.
    pub fn reject(&self, error: FlowError) {
        self.settle(Err(error));
    }

    /// Whether a resolve or reject has already taken effect.
    pub fn is_settled(&self) -> bool {
        self.slot.borrow().settled
    }

    fn settle(&self, outcome: Result<T, FlowError>) {
        let mut slot = self.slot.borrow_mut();
        if slot.settled {
            return;
        }
        slot.settled = true;
        slot.outcome = Some(outcome);
        // Waking right here preserves settle order: the current-thread
        // run queue polls observers in the order they were woken.
        if let Some(waker) = slot.waker.take() {
            drop(slot);
            waker.wake();
        }
    }
}

impl<T> Drop for Deferred<T> {
    fn drop(&mut self) {
        let mut slot = self.slot.borrow_mut();
        if slot.settled {
            return;
        }
        slot.settled = true;
        slot.outcome = Some(Err(FlowError::Disconnected));
        if let Some(waker) = slot.waker.take() {
            drop(slot);
            waker.wake();
        }
    }
}

impl<T> Future for DeferredFuture<T> {
    type Output = Result<T, FlowError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        if let Some(outcome) = slot.outcome.take() {
            return Poll::Ready(outcome);
        }
        slot.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

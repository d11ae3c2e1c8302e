//! The buffered handoff channel.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use async_trait::async_trait;
use rill_core::{FlowError, PullSequence};

use crate::deferred::{deferred, Deferred, DeferredFuture};

/// One queued write: the payload to deliver (a value, or an error to
/// raise at read position) and the consumption signal for backpressure.
struct WriteEntry<T> {
    payload: Result<T, FlowError>,
    consumed: Deferred<()>,
}

struct State<T> {
    writes: VecDeque<WriteEntry<T>>,
    reads: VecDeque<Deferred<Option<T>>>,
    done_writing: bool,
    drain_wakers: Vec<Waker>,
    on_read: Option<Rc<dyn Fn()>>,
}

impl<T> State<T> {
    fn is_drained(&self) -> bool {
        self.done_writing && self.writes.is_empty()
    }

    fn wake_drain_watchers(&mut self) {
        for waker in self.drain_wakers.drain(..) {
            waker.wake();
        }
    }
}

/// A buffered handoff channel between one producer and one or more
/// demand-driven consumers.
///
/// Writes buffer until a read takes them; reads queue until a value or
/// the end marker arrives. The two internal queues are never
/// simultaneously non-empty: any transition that would produce both
/// pairs the oldest entries instead, so the Nth write always reaches the
/// Nth read.
///
/// Handles are cheap to clone; every clone views the same channel. Both
/// surfaces may be invoked several times without awaiting between calls.
pub struct Channel<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                writes: VecDeque::new(),
                reads: VecDeque::new(),
                done_writing: false,
                drain_wakers: Vec::new(),
                on_read: None,
            })),
        }
    }

    /// Queue a value for the next read.
    ///
    /// The returned future settles `Ok(())` only once the value has
    /// actually been taken by a read, so a producer that awaits it is paced
    /// by real consumption, not by buffering. After [`Channel::end`] the
    /// future is already rejected with [`FlowError::ClosedForWriting`]
    /// and nothing is queued.
    pub fn write(&self, value: T) -> DeferredFuture<()> {
        self.push(Ok(value))
    }

    /// Queue an error to be raised at the read that would have received
    /// the next value, preserving its position in the sequence.
    pub fn fail(&self, error: FlowError) -> DeferredFuture<()> {
        self.push(Err(error))
    }

    fn push(&self, payload: Result<T, FlowError>) -> DeferredFuture<()> {
        let (consumed, consumption) = deferred();
        let mut state = self.state.borrow_mut();
        if state.done_writing {
            consumed.reject(FlowError::ClosedForWriting);
            return consumption;
        }
        match state.reads.pop_front() {
            Some(reader) => {
                match payload {
                    Ok(value) => reader.resolve(Some(value)),
                    Err(error) => reader.reject(error),
                }
                consumed.resolve(());
            }
            None => state.writes.push_back(WriteEntry { payload, consumed }),
        }
        consumption
    }

    /// Take the next result.
    ///
    /// A buffered write pairs synchronously, oldest first. An ended,
    /// empty channel answers done, idempotently and never as an error.
    /// Otherwise the read queues; if it is the only read waiting and a
    /// demand hook is installed, the hook fires once (it does not refire
    /// for reads still waiting from a prior invocation).
    pub fn read(&self) -> DeferredFuture<Option<T>> {
        let (slot, result) = deferred();
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.writes.pop_front() {
            match entry.payload {
                Ok(value) => slot.resolve(Some(value)),
                Err(error) => slot.reject(error),
            }
            entry.consumed.resolve(());
            if state.is_drained() {
                state.wake_drain_watchers();
            }
            return result;
        }
        if state.done_writing {
            slot.resolve(None);
            return result;
        }
        let first_waiter = state.reads.is_empty();
        state.reads.push_back(slot);
        let hook = if first_waiter {
            state.on_read.clone()
        } else {
            None
        };
        // Release the borrow before firing: the hook may call straight
        // back into write/end.
        drop(state);
        if let Some(hook) = hook {
            hook();
        }
        result
    }

    /// Stop accepting writes.
    ///
    /// Reads already waiting resolve with done immediately. The returned
    /// barrier settles once every buffered-but-unread entry has been
    /// taken (immediately if none). Repeated calls are no-ops that hand
    /// back the same barrier.
    pub fn end(&self) -> Drained<T> {
        let mut state = self.state.borrow_mut();
        if !state.done_writing {
            state.done_writing = true;
            tracing::trace!(buffered = state.writes.len(), "channel ended");
            for reader in state.reads.drain(..) {
                reader.resolve(None);
            }
            if state.is_drained() {
                state.wake_drain_watchers();
            }
        }
        Drained {
            state: self.state.clone(),
        }
    }

    /// Install the demand hook, fired when a read starts waiting on an
    /// otherwise idle channel. Single-assignment: fails with
    /// [`FlowError::HookAlreadySet`] until [`Channel::clear_on_read`].
    pub fn set_on_read(&self, hook: impl Fn() + 'static) -> Result<(), FlowError> {
        let mut state = self.state.borrow_mut();
        if state.on_read.is_some() {
            return Err(FlowError::HookAlreadySet);
        }
        state.on_read = Some(Rc::new(hook));
        Ok(())
    }

    /// Remove the demand hook.
    pub fn clear_on_read(&self) {
        self.state.borrow_mut().on_read = None;
    }

    /// Number of reads currently waiting for a value.
    pub fn waiting_reads(&self) -> usize {
        self.state.borrow().reads.len()
    }

    /// Number of written-but-unread entries.
    pub fn buffered_writes(&self) -> usize {
        self.state.borrow().writes.len()
    }

    /// Whether [`Channel::end`] has taken effect.
    pub fn is_ended(&self) -> bool {
        self.state.borrow().done_writing
    }

    /// Downgrade to a handle that does not keep the channel alive.
    ///
    /// Demand hooks that need to call back into their own channel hold
    /// one of these, since the hook itself is owned by the channel.
    pub fn downgrade(&self) -> WeakChannel<T> {
        WeakChannel {
            state: Rc::downgrade(&self.state),
        }
    }
}

/// A non-owning channel handle; see [`Channel::downgrade`].
pub struct WeakChannel<T> {
    state: Weak<RefCell<State<T>>>,
}

impl<T> Clone for WeakChannel<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> WeakChannel<T> {
    pub fn upgrade(&self) -> Option<Channel<T>> {
        self.state.upgrade().map(|state| Channel { state })
    }
}

/// Barrier returned by [`Channel::end`]: settles once the channel is
/// ended and every buffered entry has been read.
pub struct Drained<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Future for Drained<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.state.borrow_mut();
        if state.is_drained() {
            Poll::Ready(())
        } else {
            state.drain_wakers.push(cx.waker().clone());
            Poll::Pending
        }
    }
}

#[async_trait(?Send)]
impl<T> PullSequence for Channel<T> {
    type Item = T;

    async fn next(&self) -> Result<Option<T>, FlowError> {
        self.read().await
    }
}

//! Bounded-parallel pulling.

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use rill_channel::Channel;
use rill_core::{FlowError, PullSequence, Source};

/// Output of [`buffered`]: the source's values in completion order.
pub struct Buffered<T> {
    channel: Channel<T>,
}

impl<T> std::fmt::Debug for Buffered<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffered").finish_non_exhaustive()
    }
}

struct PullerState {
    concurrency: usize,
    outstanding: Cell<usize>,
    finished: Cell<bool>,
}

/// Pull from `source` with up to `concurrency` requests outstanding at a
/// time.
///
/// Values are published as their pulls complete, so output order is not
/// guaranteed to match source order. A pull slot is held until its value
/// is actually consumed downstream, which bounds buffering at
/// `concurrency` as well. An upstream error terminates the output at the
/// position it occurred. Must be called within a `LocalSet`.
pub fn buffered<T: 'static>(
    source: Source<T>,
    concurrency: usize,
) -> Result<Buffered<T>, FlowError> {
    if concurrency == 0 {
        return Err(FlowError::invalid("concurrency must be at least 1, got 0"));
    }
    let sequence: Rc<dyn PullSequence<Item = T>> = Rc::from(source.normalize());
    let channel = Channel::new();
    let state = Rc::new(PullerState {
        concurrency,
        outstanding: Cell::new(0),
        finished: Cell::new(false),
    });
    tracing::debug!(concurrency, "starting bounded pull");
    for _ in 0..concurrency {
        spawn_pull(state.clone(), sequence.clone(), channel.clone());
    }
    Ok(Buffered { channel })
}

fn spawn_pull<T: 'static>(
    state: Rc<PullerState>,
    sequence: Rc<dyn PullSequence<Item = T>>,
    channel: Channel<T>,
) {
    state.outstanding.set(state.outstanding.get() + 1);
    tokio::task::spawn_local(async move {
        match sequence.next().await {
            Ok(Some(value)) => {
                let _ = channel.write(value).await;
            }
            Ok(None) => state.finished.set(true),
            Err(error) => {
                state.finished.set(true);
                let _ = channel.fail(error).await;
            }
        }
        state.outstanding.set(state.outstanding.get() - 1);
        if state.finished.get() {
            if state.outstanding.get() == 0 {
                let _ = channel.end();
            }
        } else if state.outstanding.get() < state.concurrency {
            spawn_pull(state, sequence, channel);
        }
    });
}

#[async_trait(?Send)]
impl<T> PullSequence for Buffered<T> {
    type Item = T;

    async fn next(&self) -> Result<Option<T>, FlowError> {
        self.channel.read().await
    }
}

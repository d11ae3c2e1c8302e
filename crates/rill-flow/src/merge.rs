//! First-available merging.

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use rill_channel::Channel;
use rill_core::{FlowError, PullSequence, Source};

/// Output of [`merge`]: values from every source, in completion order.
pub struct Merged<T> {
    channel: Channel<T>,
}

/// Merge independent sources into one sequence ordered by completion
/// time.
///
/// Each source has exactly one pull outstanding at any moment, so
/// sources that forbid concurrent reads are safe here. A driver re-pulls
/// its source as soon as the previous value's write settles; consumer
/// backpressure reaches the sources only through that write pacing. An
/// error from a source is delivered at the read position where it
/// occurred and stops that source; the output ends when every source is
/// finished. Must be called within a `LocalSet`.
pub fn merge<T: 'static>(sources: Vec<Source<T>>) -> Merged<T> {
    let channel = Channel::new();
    tracing::debug!(sources = sources.len(), "merging sources");
    if sources.is_empty() {
        let _ = channel.end();
        return Merged { channel };
    }
    let remaining = Rc::new(Cell::new(sources.len()));
    for source in sources {
        let sequence = source.normalize();
        let channel = channel.clone();
        let remaining = remaining.clone();
        tokio::task::spawn_local(async move {
            loop {
                match sequence.next().await {
                    Ok(Some(value)) => {
                        if channel.write(value).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        let _ = channel.fail(error).await;
                        break;
                    }
                }
            }
            remaining.set(remaining.get() - 1);
            if remaining.get() == 0 {
                let _ = channel.end();
            }
        });
    }
    Merged { channel }
}

#[async_trait(?Send)]
impl<T> PullSequence for Merged<T> {
    type Item = T;

    async fn next(&self) -> Result<Option<T>, FlowError> {
        self.channel.read().await
    }
}

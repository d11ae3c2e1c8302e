//! Draining a sequence for its side effects.

use rill_core::{FlowError, PullSequence, Source};

use crate::buffered::buffered;

/// Consume `source` to exhaustion, one pull at a time, discarding the
/// values.
///
/// Resolves once the source is exhausted. The first error is returned
/// and nothing further is consumed. Must be called within a `LocalSet`.
pub async fn drain<T: 'static>(source: Source<T>) -> Result<(), FlowError> {
    drain_with(source, 1).await
}

/// Like [`drain`], pulling up to `concurrency` values at once.
pub async fn drain_with<T: 'static>(
    source: Source<T>,
    concurrency: usize,
) -> Result<(), FlowError> {
    let pulled = buffered(source, concurrency)?;
    while pulled.next().await?.is_some() {}
    Ok(())
}

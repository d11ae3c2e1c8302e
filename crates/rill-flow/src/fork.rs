//! Fan-out splitting.

use std::cell::Cell;
use std::fmt::Debug;
use std::rc::Rc;

use async_trait::async_trait;
use rill_channel::Channel;
use rill_core::{FlowError, PullSequence, Source};

/// One consumer-facing branch of a forked sequence.
pub struct ForkBranch<T> {
    channel: Channel<T>,
}

impl<T> std::fmt::Debug for ForkBranch<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForkBranch").finish_non_exhaustive()
    }
}

/// Split `source` into `branches` independent sequences sharing exactly
/// one underlying iterator.
///
/// Each read on any branch pulls the shared iterator exactly once, and
/// whichever read was issued first receives the next value. Nothing is
/// duplicated, lost, or buffered. The source must be a genuine
/// multi-value source; a bare value is refused. Must be called within a
/// `LocalSet`.
pub fn fork<T: Debug + 'static>(
    source: Source<T>,
    branches: usize,
) -> Result<Vec<ForkBranch<T>>, FlowError> {
    if branches == 0 {
        return Err(FlowError::invalid("branch count must be at least 1, got 0"));
    }
    let sequence: Rc<dyn PullSequence<Item = T>> = Rc::from(source.strict()?);
    let channel = Channel::new();
    tracing::debug!(branches, "forking sequence");

    // The hook holds only a weak handle; the channel owns the hook.
    let weak = channel.downgrade();
    let active = Rc::new(Cell::new(false));
    channel.set_on_read(move || {
        let channel = match weak.upgrade() {
            Some(channel) => channel,
            None => return,
        };
        // One service pass at a time; while a pass is pulling, the read
        // that triggered it is still waiting, so demand cannot re-arm
        // until the pass drains.
        if active.get() {
            return;
        }
        active.set(true);
        let active = active.clone();
        let sequence = sequence.clone();
        tokio::task::spawn_local(async move {
            while channel.waiting_reads() > 0 {
                match sequence.next().await {
                    Ok(Some(value)) => {
                        let _ = channel.write(value).await;
                    }
                    Ok(None) => {
                        let _ = channel.end();
                        break;
                    }
                    Err(error) => {
                        let _ = channel.fail(error).await;
                    }
                }
            }
            active.set(false);
        });
    })?;

    Ok((0..branches)
        .map(|_| ForkBranch {
            channel: channel.clone(),
        })
        .collect())
}

#[async_trait(?Send)]
impl<T> PullSequence for ForkBranch<T> {
    type Item = T;

    async fn next(&self) -> Result<Option<T>, FlowError> {
        self.channel.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_zero_branches() {
        let err = fork(Source::from(vec![1]), 0).unwrap_err();
        assert!(err.is_validation_error());
    }

    #[tokio::test]
    async fn test_rejects_bare_value() {
        let err = fork(Source::Single(5), 2).unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: `5` is not iterable");
    }

    #[tokio::test]
    async fn test_first_read_receives_next_value() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let branches = fork(Source::from(vec![1, 2, 3, 4]), 2).unwrap();
                let (left, right) = (&branches[0], &branches[1]);

                // Issue reads on both branches without awaiting between
                // them: the earlier read gets the earlier value.
                let (a, b) = tokio::join!(left.next(), right.next());
                assert_eq!(a.unwrap(), Some(1));
                assert_eq!(b.unwrap(), Some(2));

                let (b, a) = tokio::join!(right.next(), left.next());
                assert_eq!(b.unwrap(), Some(3));
                assert_eq!(a.unwrap(), Some(4));
            })
            .await;
    }

    #[tokio::test]
    async fn test_branches_collectively_see_each_value_once() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let branches = fork(Source::from((0..10).collect::<Vec<_>>()), 3).unwrap();

                // A fast consumer on one branch takes everything the
                // others never ask for.
                let fast = branches[0].collect_remaining().await.unwrap();
                assert_eq!(fast, (0..10).collect::<Vec<_>>());

                // The starved branches observe a finished sequence.
                assert_eq!(branches[1].next().await.unwrap(), None);
                assert_eq!(branches[2].next().await.unwrap(), None);
            })
            .await;
    }

    #[tokio::test]
    async fn test_uneven_read_speeds_share_one_iterator() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let branches = fork(Source::from(vec!["a", "b", "c"]), 2).unwrap();

                assert_eq!(branches[0].next().await.unwrap(), Some("a"));
                assert_eq!(branches[1].next().await.unwrap(), Some("b"));
                assert_eq!(branches[0].next().await.unwrap(), Some("c"));
                assert_eq!(branches[0].next().await.unwrap(), None);
                assert_eq!(branches[1].next().await.unwrap(), None);
            })
            .await;
    }
}

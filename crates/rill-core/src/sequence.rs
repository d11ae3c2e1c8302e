//! The pull-sequence abstraction.

use std::cell::RefCell;
use std::iter::Fuse;
use std::rc::Rc;

use async_trait::async_trait;

use crate::error::FlowError;

/// Zero or more values over time, consumed by repeatedly requesting the
/// next one.
///
/// `next` takes `&self` so the surface can be invoked several times
/// without awaiting between calls; implementations either answer
/// synchronously or queue the requests FIFO. Exhaustion is reported as
/// `Ok(None)` and is idempotent; upstream errors are delivered at the
/// sequence position a value would have occupied.
#[async_trait(?Send)]
pub trait PullSequence {
    type Item;

    /// Request the next value.
    async fn next(&self) -> Result<Option<Self::Item>, FlowError>;

    /// Collect every remaining value, propagating the first error.
    async fn collect_remaining(&self) -> Result<Vec<Self::Item>, FlowError> {
        let mut values = Vec::new();
        while let Some(value) = self.next().await? {
            values.push(value);
        }
        Ok(values)
    }
}

impl<T> std::fmt::Debug for dyn PullSequence<Item = T> + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullSequence").finish_non_exhaustive()
    }
}

#[async_trait(?Send)]
impl<S: PullSequence + ?Sized> PullSequence for Box<S> {
    type Item = S::Item;

    async fn next(&self) -> Result<Option<Self::Item>, FlowError> {
        (**self).next().await
    }
}

#[async_trait(?Send)]
impl<S: PullSequence + ?Sized> PullSequence for Rc<S> {
    type Item = S::Item;

    async fn next(&self) -> Result<Option<Self::Item>, FlowError> {
        (**self).next().await
    }
}

/// Adapter exposing a synchronous iterator as a pull sequence.
///
/// The iterator is fused so reads past exhaustion keep answering done.
pub struct IterSequence<I: Iterator> {
    iter: RefCell<Fuse<I>>,
}

impl<I: Iterator> IterSequence<I> {
    pub fn new(iter: I) -> Self {
        Self {
            iter: RefCell::new(iter.fuse()),
        }
    }
}

#[async_trait(?Send)]
impl<I: Iterator> PullSequence for IterSequence<I> {
    type Item = I::Item;

    async fn next(&self) -> Result<Option<Self::Item>, FlowError> {
        // The borrow never spans an await point.
        Ok(self.iter.borrow_mut().next())
    }
}

/// Wrap anything iterable as a pull sequence.
pub fn sequence_from_iter<I>(into_iter: I) -> IterSequence<I::IntoIter>
where
    I: IntoIterator,
{
    IterSequence::new(into_iter.into_iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_iter_sequence_yields_in_order() {
        let seq = sequence_from_iter(vec![1, 2, 3]);
        assert_eq!(seq.next().await.unwrap(), Some(1));
        assert_eq!(seq.next().await.unwrap(), Some(2));
        assert_eq!(seq.next().await.unwrap(), Some(3));
        assert_eq!(seq.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_exhaustion_is_idempotent() {
        let seq = sequence_from_iter(Vec::<u32>::new());
        assert_eq!(seq.next().await.unwrap(), None);
        assert_eq!(seq.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_collect_remaining() {
        let seq = sequence_from_iter(vec!["a", "b", "c"]);
        assert_eq!(seq.next().await.unwrap(), Some("a"));
        assert_eq!(seq.collect_remaining().await.unwrap(), vec!["b", "c"]);
        assert!(seq.collect_remaining().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_boxed_sequence_delegates() {
        let seq: Box<dyn PullSequence<Item = u32>> =
            Box::new(sequence_from_iter(vec![7, 8]));
        assert_eq!(seq.collect_remaining().await.unwrap(), vec![7, 8]);
    }
}

//! Normalization of loose inputs into sequences at the API boundary.

use std::fmt::Debug;

use crate::error::FlowError;
use crate::sequence::{sequence_from_iter, PullSequence};

/// The three shapes of input a combinator accepts: nothing, a single
/// value, or a full sequence.
///
/// Resolving the shape once at the boundary replaces runtime
/// capability-sniffing while keeping call sites flexible.
pub enum Source<T> {
    /// No values at all.
    Empty,
    /// Exactly one value.
    Single(T),
    /// A pull sequence of values.
    Sequence(Box<dyn PullSequence<Item = T>>),
}

impl<T: 'static> Source<T> {
    /// Wrap a pull sequence.
    pub fn sequence(sequence: impl PullSequence<Item = T> + 'static) -> Self {
        Self::Sequence(Box::new(sequence))
    }

    /// Resolve to a uniform pull interface: nothing becomes an
    /// already-exhausted sequence, a single value becomes a one-element
    /// sequence.
    pub fn normalize(self) -> Box<dyn PullSequence<Item = T>> {
        match self {
            Self::Empty => Box::new(sequence_from_iter(std::iter::empty())),
            Self::Single(value) => Box::new(sequence_from_iter(std::iter::once(value))),
            Self::Sequence(sequence) => sequence,
        }
    }
}

impl<T: Debug + 'static> Source<T> {
    /// Like [`Source::normalize`], but a bare value is refused instead of
    /// being wrapped; call sites that require a genuine multi-value
    /// source use this variant.
    pub fn strict(self) -> Result<Box<dyn PullSequence<Item = T>>, FlowError> {
        match self {
            Self::Single(value) => {
                Err(FlowError::invalid(format!("`{value:?}` is not iterable")))
            }
            other => Ok(other.normalize()),
        }
    }
}

impl<T: 'static> From<Option<T>> for Source<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            None => Self::Empty,
            Some(value) => Self::Single(value),
        }
    }
}

impl<T: 'static> From<Vec<T>> for Source<T> {
    fn from(values: Vec<T>) -> Self {
        Self::sequence(sequence_from_iter(values))
    }
}

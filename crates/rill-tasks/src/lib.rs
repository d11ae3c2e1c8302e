//! Bounded tracking of in-flight tasks.
//!
//! A [`TaskTracker`] holds up to a fixed number of awaitables. It never
//! queues: adding at capacity is an error, and callers are expected to
//! [`TaskTracker::wait_for_slot`] first. Independent of the channel
//! machinery; the only primitive used is awaiting.

use std::future::Future;

use futures::future::{join_all, select_all, LocalBoxFuture};
use futures::FutureExt;
use thiserror::Error;

/// Error type for tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// `add` called with the tracker already at its limit.
    #[error("task limit of {0} reached; wait for a slot first")]
    AtCapacity(usize),
}

/// Tracks up to a fixed number of in-flight awaitables.
pub struct TaskTracker {
    limit: usize,
    next_id: u64,
    tracked: Vec<LocalBoxFuture<'static, u64>>,
}

impl TaskTracker {
    /// Create a tracker that holds at most `limit` tasks.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            next_id: 0,
            tracked: Vec::new(),
        }
    }

    /// Track a task, assigning it the next id.
    ///
    /// Fails with [`TrackerError::AtCapacity`] when full. The check and
    /// insert are synchronous, so this is a caller contract violation,
    /// never a race. The task's output is discarded; the id identifies
    /// it until it settles.
    pub fn add<F>(&mut self, task: F) -> Result<u64, TrackerError>
    where
        F: Future + 'static,
    {
        if self.tracked.len() >= self.limit {
            return Err(TrackerError::AtCapacity(self.limit));
        }
        let id = self.next_id;
        self.next_id += 1;
        tracing::trace!(id, tracked = self.tracked.len() + 1, "tracking task");
        self.tracked.push(
            async move {
                task.await;
                id
            }
            .boxed_local(),
        );
        Ok(id)
    }

    /// Wait until a task can be added.
    ///
    /// Resolves immediately with `None` when under the limit; otherwise
    /// races the tracked tasks, removes the first to settle, and returns
    /// its id.
    pub async fn wait_for_slot(&mut self) -> Option<u64> {
        if self.tracked.is_empty() || self.tracked.len() < self.limit {
            return None;
        }
        let tracked = std::mem::take(&mut self.tracked);
        let (id, _, rest) = select_all(tracked).await;
        self.tracked = rest;
        tracing::trace!(id, "task settled, slot freed");
        Some(id)
    }

    /// Wait for every currently tracked task to settle, returning their
    /// ids in tracking order. Tasks added afterward are not waited on.
    pub async fn wait_all(&mut self) -> Vec<u64> {
        join_all(std::mem::take(&mut self.tracked)).await
    }

    /// Number of tasks currently tracked.
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// The configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

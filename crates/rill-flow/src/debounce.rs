//! Trailing-window debouncing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use rill_channel::Channel;
use rill_core::{FlowError, PullSequence, Source};

/// Output of [`debounce`]: batches of values grouped by quiet windows.
pub struct Debounced<T> {
    channel: Channel<Vec<T>>,
}

struct DebounceState<T> {
    buffer: RefCell<Vec<T>>,
    /// Bumped on every collected value and every flush; a timer whose
    /// generation no longer matches has been superseded.
    generation: Cell<u64>,
    armed: Cell<bool>,
    channel: Channel<Vec<T>>,
}

impl<T> DebounceState<T> {
    fn flush(&self) {
        let batch = self.buffer.take();
        if batch.is_empty() {
            return;
        }
        self.generation.set(self.generation.get() + 1);
        self.armed.set(false);
        tracing::trace!(values = batch.len(), "flushing batch");
        let _ = self.channel.write(batch);
    }
}

/// Collect `source` into batches separated by quiet windows of at least
/// `delay`.
///
/// The window restarts on every collected value, as a classic trailing
/// debounce does. A batch is handed over only once a consumer is actually
/// waiting and the window has elapsed; values collected before the first
/// read accumulate without bound until that read's window elapses. On
/// source exhaustion any remainder is handed over immediately, bypassing
/// the delay. Must be called within a `LocalSet`.
pub fn debounce<T: 'static>(
    source: Source<T>,
    delay: Duration,
) -> Result<Debounced<T>, FlowError> {
    let sequence = source.normalize();
    let channel = Channel::new();
    let state = Rc::new(DebounceState {
        buffer: RefCell::new(Vec::new()),
        generation: Cell::new(0),
        armed: Cell::new(false),
        channel: channel.clone(),
    });

    // A late consumer collects a batch whose window already elapsed.
    let hook_state = Rc::downgrade(&state);
    channel.set_on_read(move || {
        if let Some(state) = hook_state.upgrade() {
            if !state.armed.get() {
                state.flush();
            }
        }
    })?;

    let collector = state.clone();
    tokio::task::spawn_local(async move {
        loop {
            match sequence.next().await {
                Ok(Some(value)) => {
                    collector.buffer.borrow_mut().push(value);
                    arm(collector.clone(), delay);
                }
                Ok(None) => {
                    collector.flush();
                    let _ = collector.channel.end();
                    break;
                }
                Err(error) => {
                    // Values that preceded the error are delivered first.
                    collector.flush();
                    let _ = collector.channel.fail(error);
                    let _ = collector.channel.end();
                    break;
                }
            }
        }
    });

    Ok(Debounced { channel })
}

/// Restart the quiet window for the newest value.
fn arm<T: 'static>(state: Rc<DebounceState<T>>, delay: Duration) {
    state.generation.set(state.generation.get() + 1);
    state.armed.set(true);
    let generation = state.generation.get();
    tokio::task::spawn_local(async move {
        tokio::time::sleep(delay).await;
        if state.generation.get() != generation {
            return;
        }
        state.armed.set(false);
        if state.channel.waiting_reads() > 0 {
            state.flush();
        }
    });
}

#[async_trait(?Send)]
impl<T> PullSequence for Debounced<T> {
    type Item = Vec<T>;

    async fn next(&self) -> Result<Option<Vec<T>>, FlowError> {
        self.channel.read().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Source that produces each entry after its own delay; a `None`
    /// entry ends the sequence after the delay.
    struct TimedSource<T> {
        schedule: RefCell<VecDeque<(u64, Option<T>)>>,
    }

    impl<T> TimedSource<T> {
        fn new(schedule: Vec<(u64, Option<T>)>) -> Self {
            Self {
                schedule: RefCell::new(schedule.into_iter().collect()),
            }
        }
    }

    #[async_trait(?Send)]
    impl<T> PullSequence for TimedSource<T> {
        type Item = T;

        async fn next(&self) -> Result<Option<T>, FlowError> {
            let entry = self.schedule.borrow_mut().pop_front();
            match entry {
                Some((delay_ms, item)) => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok(item)
                }
                None => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_source_yields_no_batches() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let batches =
                    debounce(Source::<u32>::Empty, Duration::from_millis(50)).unwrap();
                assert!(batches.collect_remaining().await.unwrap().is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn test_single_value_zero_delay() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let batches = debounce(Source::from(vec!["x"]), Duration::ZERO).unwrap();
                assert_eq!(
                    batches.collect_remaining().await.unwrap(),
                    vec![vec!["x"]]
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collects_into_one_batch_for_late_reader() {
        tokio::task::LocalSet::new()
            .run_until(async {
                // Values at t=0, 10, 10; the source then stays open well
                // past the window.
                let source = TimedSource::new(vec![
                    (0, Some(1)),
                    (10, Some(2)),
                    (0, Some(3)),
                    (60_000, None),
                ]);
                let batches = debounce(Source::sequence(source), Duration::from_millis(300))
                    .unwrap();

                // First read happens after the window has long elapsed.
                tokio::time::sleep(Duration::from_millis(400)).await;
                assert_eq!(batches.next().await.unwrap(), Some(vec![1, 2, 3]));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_gap_splits_batches() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let source = TimedSource::new(vec![
                    (0, Some("early")),
                    (500, Some("late")),
                    (60_000, None),
                ]);
                let batches = debounce(Source::sequence(source), Duration::from_millis(100))
                    .unwrap();

                // A waiting consumer receives each batch as its window
                // closes.
                assert_eq!(batches.next().await.unwrap(), Some(vec!["early"]));
                assert_eq!(batches.next().await.unwrap(), Some(vec!["late"]));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_value_restarts_the_window() {
        tokio::task::LocalSet::new()
            .run_until(async {
                // Second value lands inside the first value's window.
                let source = TimedSource::new(vec![
                    (0, Some(1)),
                    (80, Some(2)),
                    (60_000, None),
                ]);
                let batches = debounce(Source::sequence(source), Duration::from_millis(100))
                    .unwrap();

                let batch = batches.next().await.unwrap();
                assert_eq!(batch, Some(vec![1, 2]));
            })
            .await;
    }

    #[tokio::test]
    async fn test_exhaustion_flushes_remainder_immediately() {
        tokio::task::LocalSet::new()
            .run_until(async {
                // A huge window never elapses; the final batch arrives
                // anyway once the source ends.
                let batches = debounce(
                    Source::from(vec![1, 2, 3]),
                    Duration::from_secs(3600),
                )
                .unwrap();
                assert_eq!(
                    batches.collect_remaining().await.unwrap(),
                    vec![vec![1, 2, 3]]
                );
            })
            .await;
    }

    #[tokio::test]
    async fn test_error_follows_collected_values() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let source = FailingAfterOne::default();
                let batches =
                    debounce(Source::sequence(source), Duration::from_millis(10)).unwrap();

                assert_eq!(batches.next().await.unwrap(), Some(vec![1]));
                let err = batches.next().await.unwrap_err();
                assert_eq!(err.to_string(), "watcher died");
                assert_eq!(batches.next().await.unwrap(), None);
            })
            .await;
    }

    #[derive(Default)]
    struct FailingAfterOne {
        pulled: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl PullSequence for FailingAfterOne {
        type Item = u32;

        async fn next(&self) -> Result<Option<u32>, FlowError> {
            if self.pulled.get() {
                return Err(FlowError::upstream(anyhow::anyhow!("watcher died")));
            }
            self.pulled.set(true);
            Ok(Some(1))
        }
    }
}

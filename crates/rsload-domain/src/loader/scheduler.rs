//! Flush timing: size-threshold and wait-window triggers.
//!
//! Both triggers funnel through [`BatchCollector::take`] or receive a batch
//! already swapped out under the collector lock, so whichever fires first
//! executes the generation and the other is a no-op.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::collector::{BatchCollector, FlushTrigger, PendingBatch};
use super::executor::BatchExecutor;
use super::types::BatchFn;

/// Which trigger flushed a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushReason {
    Size,
    Timer,
}

impl FlushReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Timer => "timer",
        }
    }
}

/// Disarms its generation when the timer task ends, however it ends.
///
/// After a normal flush the generation has already moved on and this is
/// a no-op. If the task is dropped first, for example because its runtime
/// shut down, the pending batch is marked as having no timer and the next
/// enqueue arms a new one.
struct TimerGuard<K, V> {
    collector: Arc<BatchCollector<K, V>>,
    generation: u64,
}

impl<K, V> Drop for TimerGuard<K, V> {
    fn drop(&mut self) {
        self.collector.disarm(self.generation);
    }
}

pub(crate) struct BatchScheduler<K, V, F> {
    collector: Arc<BatchCollector<K, V>>,
    executor: Arc<BatchExecutor<K, V, F>>,
    wait: Duration,
}

impl<K, V, F> BatchScheduler<K, V, F>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    pub fn new(
        collector: Arc<BatchCollector<K, V>>,
        executor: Arc<BatchExecutor<K, V, F>>,
        wait: Duration,
    ) -> Self {
        Self {
            collector,
            executor,
            wait,
        }
    }

    /// Acts on the trigger produced by an enqueue.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, trigger: FlushTrigger<K, V>) {
        match trigger {
            FlushTrigger::None => {}
            FlushTrigger::ArmTimer {
                generation,
                opened_at,
            } => self.arm_timer(generation, opened_at),
            FlushTrigger::Flush(batch) => self.dispatch(batch, FlushReason::Size),
        }
    }

    fn arm_timer(&self, generation: u64, opened_at: Instant) {
        let collector = Arc::clone(&self.collector);
        let executor = Arc::clone(&self.executor);
        let deadline = opened_at + self.wait;
        // Moved into the task so it also drops if the task never runs.
        let guard = TimerGuard {
            collector: Arc::clone(&collector),
            generation,
        };

        tokio::spawn(async move {
            let _guard = guard;
            tokio::time::sleep_until(deadline).await;
            match collector.take(generation) {
                Some(batch) => executor.execute(batch, FlushReason::Timer).await,
                None => tracing::trace!(generation, "batch already flushed by size threshold"),
            }
        });
    }

    /// Runs the batch on its own task, detached from any caller.
    fn dispatch(&self, batch: PendingBatch<K, V>, reason: FlushReason) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            executor.execute(batch, reason).await;
        });
    }
}

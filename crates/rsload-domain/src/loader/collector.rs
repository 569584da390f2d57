//! Accumulation of requested keys into the current pending batch.
//!
//! All reads and writes of the pending batch go through one mutex. The
//! only transition between generations is [`BatchCollector::take`], which
//! swaps the accumulated batch out for a fresh, empty one.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use super::waiter::{Waiter, WaiterSlot};

/// Keys accumulated since the last flush, with one waiter slot per key.
pub(crate) struct PendingBatch<K, V> {
    pub generation: u64,
    pub keys: Vec<K>,
    pub waiters: HashMap<K, WaiterSlot<V>>,
    /// When the first key joined; the wait window is measured from here.
    opened_at: Option<Instant>,
    /// Set while a timer task for this generation is alive.
    timer_armed: bool,
}

impl<K, V> PendingBatch<K, V> {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            keys: Vec::new(),
            waiters: HashMap::new(),
            opened_at: None,
            timer_armed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// What the caller of [`BatchCollector::enqueue`] must do next.
pub(crate) enum FlushTrigger<K, V> {
    /// Nothing; the key joined a batch whose timer is already armed.
    None,
    /// The batch has no live timer; arm one that fires once the window
    /// opened at `opened_at` has elapsed.
    ArmTimer { generation: u64, opened_at: Instant },
    /// The size threshold was reached; this batch must execute now.
    Flush(PendingBatch<K, V>),
}

/// Result of enqueueing one key.
pub(crate) struct Enqueued<K, V> {
    pub waiter: Waiter<V>,
    pub trigger: FlushTrigger<K, V>,
}

pub(crate) struct BatchCollector<K, V> {
    max_batch_size: usize,
    pending: Mutex<PendingBatch<K, V>>,
}

impl<K, V> BatchCollector<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            pending: Mutex::new(PendingBatch::new(0)),
        }
    }

    /// Registers interest in `key` within the current pending batch.
    ///
    /// A key already pending is not appended again; the caller gets
    /// another reader on the existing waiter. Any enqueue into a batch
    /// whose timer is gone re-arms it, so a batch never waits on the
    /// size threshold alone.
    pub fn enqueue(&self, key: K) -> Enqueued<K, V> {
        let mut pending = self.lock();

        let waiter = match pending.waiters.get(&key) {
            Some(slot) => slot.subscribe(),
            None => {
                let (slot, waiter) = WaiterSlot::new();
                pending.keys.push(key.clone());
                pending.waiters.insert(key, slot);
                pending.opened_at.get_or_insert_with(Instant::now);

                if pending.len() >= self.max_batch_size {
                    return Enqueued {
                        waiter,
                        trigger: FlushTrigger::Flush(Self::swap(&mut pending)),
                    };
                }
                waiter
            }
        };

        let trigger = match pending.opened_at {
            Some(opened_at) if !pending.timer_armed => {
                pending.timer_armed = true;
                FlushTrigger::ArmTimer {
                    generation: pending.generation,
                    opened_at,
                }
            }
            _ => FlushTrigger::None,
        };

        Enqueued { waiter, trigger }
    }

    /// Takes the pending batch for execution, if it is still `generation`
    /// and holds at least one key.
    ///
    /// A request against an empty or already swapped-out batch returns
    /// `None`, so at most one trigger executes each generation.
    pub fn take(&self, generation: u64) -> Option<PendingBatch<K, V>> {
        let mut pending = self.lock();
        if pending.generation != generation || pending.is_empty() {
            return None;
        }
        Some(Self::swap(&mut pending))
    }

    /// Number of keys in the batch currently accumulating.
    pub fn pending_len(&self) -> usize {
        self.lock().len()
    }

    fn swap(pending: &mut PendingBatch<K, V>) -> PendingBatch<K, V> {
        let next = PendingBatch::new(pending.generation + 1);
        std::mem::replace(pending, next)
    }
}

impl<K, V> BatchCollector<K, V> {
    /// Records that the timer for `generation` ended without flushing,
    /// so the next enqueue arms a new one.
    pub fn disarm(&self, generation: u64) {
        let mut pending = self.lock();
        if pending.generation == generation {
            pending.timer_armed = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingBatch<K, V>> {
        // No user code runs under this lock, so a poisoned state is intact.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Single-write, multi-reader delivery points for pending keys.

use tokio::sync::watch;

use crate::error::LoaderResult;

/// Write end of a waiter. Owned by the pending batch.
///
/// `resolve` consumes the slot, so an outcome is written at most once.
/// Dropping an unresolved slot closes the waiter; readers then observe
/// abandonment rather than blocking forever.
pub(crate) struct WaiterSlot<V> {
    tx: watch::Sender<Option<LoaderResult<V>>>,
}

/// Read end of a waiter. Cloned once per interested caller.
///
/// Backed by a watch channel, so every reader sees the same terminal
/// outcome, including readers that subscribe after it was written.
#[derive(Clone)]
pub(crate) struct Waiter<V> {
    rx: watch::Receiver<Option<LoaderResult<V>>>,
}

impl<V: Clone> WaiterSlot<V> {
    pub fn new() -> (Self, Waiter<V>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, Waiter { rx })
    }

    /// Registers another reader on this slot.
    pub fn subscribe(&self) -> Waiter<V> {
        Waiter {
            rx: self.tx.subscribe(),
        }
    }

    /// Writes the terminal outcome and finalizes the slot.
    pub fn resolve(self, outcome: LoaderResult<V>) {
        // send_replace stores the value even when no reader is left.
        self.tx.send_replace(Some(outcome));
    }
}

impl<V: Clone> Waiter<V> {
    /// Waits for the terminal outcome.
    ///
    /// Returns `None` if the slot was dropped without being resolved.
    pub async fn wait(mut self) -> Option<LoaderResult<V>> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        }
    }

    #[cfg(test)]
    pub fn is_resolved(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

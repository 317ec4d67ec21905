//! Write-once observable cell
//!
//! Background fetch tasks settle a post's asynchronous fields through a
//! [`Slot`]. The first write wins; later writes are rejected. Any number of
//! observers can await settlement.

use tokio::sync::watch;

/// Write-once cell with settlement notification
#[derive(Debug)]
pub struct Slot<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Slot<T> {
    /// Create an unsettled slot
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Settle the slot
    ///
    /// Returns `false` and drops `value` if the slot was already settled.
    pub fn set(&self, value: T) -> bool {
        let mut value = Some(value);
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = value.take();
            true
        })
    }

    /// Current value, if settled
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Whether the slot is settled
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until settled
    pub async fn settled(&self) -> T {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(value) = rx.borrow_and_update().as_ref() {
                return value.clone();
            }
            // the sender lives in `self`, so this cannot observe a closed channel
            let _ = rx.changed().await;
        }
    }
}

impl<T: Clone> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

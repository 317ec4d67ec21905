//! Consumer cancellation
//!
//! A consumer that renders posts may go away before their background fetches
//! settle. Entity writes remain safe after that point; notifying the departed
//! consumer is not. Each consumer holds a [`ConsumerGuard`] and every
//! callback registered under it checks the guard's [`CancelToken`] before
//! running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create live token
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark as cancelled
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Teardown guard owned by a consumer
///
/// Cancels its token when torn down or dropped.
#[derive(Debug, Default)]
pub struct ConsumerGuard {
    token: CancelToken,
}

impl ConsumerGuard {
    /// Create guard for a live consumer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token checked by callbacks registered under this guard
    #[inline]
    #[must_use]
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Whether the consumer is gone
    #[inline]
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Tear the consumer down explicitly
    #[inline]
    pub fn teardown(&self) {
        self.token.cancel();
    }
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

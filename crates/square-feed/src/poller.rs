//! New-post poller
//!
//! After a submission the ledger needs time to index the new transaction.
//! The poller re-runs the page query with a linearly growing delay
//! (`unit`, `2 * unit`, `3 * unit`, ...) until the submitted id appears, then
//! returns the page with that post moved to the front.
//!
//! Pending transactions that are never mined drop out of the ledger after a
//! fixed number of blocks, so polling is bounded: by an optional attempt cap
//! and by an expiry window on the total time spent waiting.

use crate::error::PollError;
use crate::normalizer::{index_posts, Normalizer, PostIndex};
use crate::post::Post;
use square_ledger::{LedgerQuery, PostFilter, TxId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Poll schedule and bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the first cycle; cycle `n` waits `n` units
    pub delay_unit: Duration,
    /// Give up after this many cycles
    pub max_attempts: Option<u32>,
    /// Give up rather than let total waiting exceed this
    pub expiry_window: Duration,
}

impl PollPolicy {
    /// Delay before cycle `attempt` (1-based)
    #[inline]
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_unit.saturating_mul(attempt)
    }

    /// Total waiting before cycle `attempts` completes
    #[must_use]
    pub fn cumulative_wait(&self, attempts: u32) -> Duration {
        (1..=attempts).fold(Duration::ZERO, |total, n| {
            total.saturating_add(self.delay_for(n))
        })
    }

    /// Whether cycle `attempt` may still run after `waited`
    #[must_use]
    pub fn allows(&self, attempt: u32, waited: Duration) -> bool {
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return false;
        }
        waited.saturating_add(self.delay_for(attempt)) <= self.expiry_window
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            delay_unit: Duration::from_secs(2),
            max_attempts: None,
            expiry_window: Duration::from_secs(6_000),
        }
    }
}

/// Observable poller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Not started
    Idle,
    /// Waiting for or running cycle `attempt`
    Polling {
        /// Current cycle, 1-based
        attempt: u32,
    },
    /// Post found
    Found {
        /// Cycles issued
        attempts: u32,
    },
    /// Bound reached without finding the post
    Expired {
        /// Cycles issued
        attempts: u32,
    },
    /// Stopped on a query failure that retrying cannot fix
    Failed {
        /// Cycles issued
        attempts: u32,
    },
}

/// Successful poll result
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// Page with the awaited post at index 0
    pub posts: Vec<Arc<Post>>,
    /// Query cycles issued
    pub attempts: u32,
    /// Total time spent waiting between cycles
    pub waited: Duration,
}

/// Move `index` to the front, keeping everything else in order
#[must_use]
pub fn move_to_front<T>(mut items: Vec<T>, index: usize) -> Vec<T> {
    if index < items.len() {
        items[..=index].rotate_right(1);
    }
    items
}

/// Poller for one submitted post
///
/// State is per submission: create one poller for each post awaited.
pub struct NewPostPoller {
    ledger: Arc<dyn LedgerQuery>,
    normalizer: Normalizer,
    policy: PollPolicy,
    state: watch::Sender<PollState>,
}

impl NewPostPoller {
    /// Create poller
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerQuery>, normalizer: Normalizer, policy: PollPolicy) -> Self {
        let (state, _rx) = watch::channel(PollState::Idle);
        Self {
            ledger,
            normalizer,
            policy,
            state,
        }
    }

    /// Poll policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Poll until `target` shows up in the page selected by `filter`
    ///
    /// A cycle whose query fails transiently (transport errors, HTTP 429 and
    /// 5xx) counts as a cycle and polling continues. Any other query failure
    /// ends polling with [`PollError::Failed`]. Posts
    /// seen in one cycle are reused by the next, so their body and profile
    /// fetches run once.
    #[instrument(skip(self, filter), fields(target = %target))]
    pub async fn poll_until_found(&self, target: &TxId, filter: &PostFilter) -> Result<PollOutcome, PollError> {
        let description = filter.build();
        let mut attempt = 0u32;
        let mut waited = Duration::ZERO;
        let mut last_failure: Option<String> = None;
        let mut previous = PostIndex::new();

        loop {
            let next = attempt + 1;
            if !self.policy.allows(next, waited) {
                self.state.send_replace(PollState::Expired { attempts: attempt });
                warn!(attempts = attempt, ?waited, "giving up on new post");
                return Err(PollError::Expired {
                    target: target.clone(),
                    attempts: attempt,
                    waited,
                    last_failure,
                });
            }

            attempt = next;
            self.state.send_replace(PollState::Polling { attempt });

            let delay = self.policy.delay_for(attempt);
            tokio::time::sleep(delay).await;
            waited += delay;

            match self.ledger.query(&description).await {
                Ok(records) => {
                    let posts = self.normalizer.normalize_page(&records, &previous);
                    if let Some(index) = posts.iter().position(|post| post.id() == target) {
                        self.state.send_replace(PollState::Found { attempts: attempt });
                        info!(attempts = attempt, ?waited, "new post indexed");
                        return Ok(PollOutcome {
                            posts: move_to_front(posts, index),
                            attempts: attempt,
                            waited,
                        });
                    }
                    debug!(attempt, count = posts.len(), "new post not indexed yet");
                    previous = index_posts(&posts);
                }
                Err(err) if err.is_retryable() => {
                    warn!(attempt, error = %err, "poll query failed, retrying");
                    last_failure = Some(err.to_string());
                }
                Err(err) => {
                    self.state.send_replace(PollState::Failed { attempts: attempt });
                    warn!(attempt, error = %err, "poll query rejected, giving up");
                    return Err(PollError::Failed {
                        target: target.clone(),
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for NewPostPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewPostPoller")
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

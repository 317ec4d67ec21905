//! Post entity
//!
//! Scalar fields are fixed when a raw record is normalized. The body and the
//! author identity settle later, each exactly once, through write-once slots
//! shared by every entity derived from the same record.

use crate::cancel::ConsumerGuard;
use crate::profile::AuthorIdentity;
use crate::slot::Slot;
use serde::{Deserialize, Serialize};
use square_ledger::{Address, BlockRef, ContentFetchFailure, RawRecord, TxId, TOPIC_TAG};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Sentinel for unknown height and timestamp
pub const UNCONFIRMED: i64 = -1;

/// Body slot content: exactly one of body or failure
pub type BodyOutcome = Result<String, ContentFetchFailure>;

/// Confirmation state of a post
///
/// Height and timestamp come from the same block reference, so a post is
/// either fully confirmed or fully unconfirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confirmation {
    /// Still pending
    Unconfirmed,
    /// Mined
    Confirmed {
        /// Block height
        height: u64,
        /// Block timestamp, seconds since the Unix epoch
        timestamp_secs: u64,
    },
}

impl Confirmation {
    /// Derive from an optional block reference
    #[inline]
    #[must_use]
    pub fn from_block(block: Option<&BlockRef>) -> Self {
        match block {
            Some(block) => Self::Confirmed {
                height: block.height,
                timestamp_secs: block.timestamp,
            },
            None => Self::Unconfirmed,
        }
    }

    /// Whether mined
    #[inline]
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    /// Block height, if mined
    #[inline]
    #[must_use]
    pub fn height(&self) -> Option<u64> {
        match self {
            Self::Confirmed { height, .. } => Some(*height),
            Self::Unconfirmed => None,
        }
    }

    /// Block height or [`UNCONFIRMED`]
    #[must_use]
    pub fn height_or_sentinel(&self) -> i64 {
        self.height()
            .map_or(UNCONFIRMED, |h| i64::try_from(h).unwrap_or(i64::MAX))
    }

    /// Submission time in milliseconds since the epoch, or [`UNCONFIRMED`]
    #[must_use]
    pub fn submitted_at_millis(&self) -> i64 {
        match self {
            Self::Confirmed { timestamp_secs, .. } => i64::try_from(*timestamp_secs)
                .unwrap_or(i64::MAX)
                .saturating_mul(1000),
            Self::Unconfirmed => UNCONFIRMED,
        }
    }

    /// Combine with a later observation; never moves back to unconfirmed
    #[inline]
    #[must_use]
    pub fn advance(self, next: Self) -> Self {
        match (self, next) {
            (Self::Confirmed { .. }, Self::Unconfirmed) => self,
            _ => next,
        }
    }
}

/// One Public Square post
#[derive(Debug)]
pub struct Post {
    id: TxId,
    author: Address,
    topic: Option<String>,
    confirmation: Confirmation,
    byte_length: u64,
    body: Arc<Slot<BodyOutcome>>,
    identity: Arc<Slot<AuthorIdentity>>,
}

impl Post {
    /// Derive a post's scalar fields from a raw record
    ///
    /// Both asynchronous fields start unsettled. The topic is the first
    /// `Topic` tag when the record declares several.
    #[must_use]
    pub fn from_record(record: &RawRecord) -> Self {
        Self {
            id: record.id.clone(),
            author: record.owner.clone(),
            topic: record.tags.first(TOPIC_TAG).map(str::to_string),
            confirmation: Confirmation::from_block(record.block.as_ref()),
            byte_length: record.data_size,
            body: Arc::new(Slot::new()),
            identity: Arc::new(Slot::new()),
        }
    }

    /// Same post with a newer confirmation, sharing the asynchronous slots
    #[must_use]
    pub fn with_confirmation(&self, next: Confirmation) -> Self {
        Self {
            id: self.id.clone(),
            author: self.author.clone(),
            topic: self.topic.clone(),
            confirmation: self.confirmation.advance(next),
            byte_length: self.byte_length,
            body: self.body.clone(),
            identity: self.identity.clone(),
        }
    }

    /// Transaction id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &TxId {
        &self.id
    }

    /// Author address
    #[inline]
    #[must_use]
    pub fn author(&self) -> &Address {
        &self.author
    }

    /// Topic, if tagged
    #[inline]
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Confirmation state
    #[inline]
    #[must_use]
    pub fn confirmation(&self) -> Confirmation {
        self.confirmation
    }

    /// Block height, or [`UNCONFIRMED`]
    #[inline]
    #[must_use]
    pub fn confirmation_height(&self) -> i64 {
        self.confirmation.height_or_sentinel()
    }

    /// Submission time in milliseconds, or [`UNCONFIRMED`]
    #[inline]
    #[must_use]
    pub fn submitted_at_millis(&self) -> i64 {
        self.confirmation.submitted_at_millis()
    }

    /// Declared body size in bytes
    #[inline]
    #[must_use]
    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    /// Body, once fetched
    #[must_use]
    pub fn body(&self) -> Option<String> {
        self.body.get().and_then(Result::ok)
    }

    /// Body fetch failure, once failed
    #[must_use]
    pub fn body_fetch_error(&self) -> Option<ContentFetchFailure> {
        self.body.get().and_then(Result::err)
    }

    /// Author identity, once resolved
    #[must_use]
    pub fn author_identity(&self) -> Option<AuthorIdentity> {
        self.identity.get()
    }

    /// Record the body fetch outcome; `false` if already recorded
    pub fn resolve_body(&self, outcome: BodyOutcome) -> bool {
        self.body.set(outcome)
    }

    /// Record the author identity; `false` if already recorded
    pub fn resolve_identity(&self, identity: AuthorIdentity) -> bool {
        self.identity.set(identity)
    }

    /// Whether the body outcome is known
    #[inline]
    #[must_use]
    pub fn is_body_settled(&self) -> bool {
        self.body.is_set()
    }

    /// Whether the author identity is known
    #[inline]
    #[must_use]
    pub fn is_identity_settled(&self) -> bool {
        self.identity.is_set()
    }

    /// Whether both asynchronous fields are known
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.is_body_settled() && self.is_identity_settled()
    }

    /// Wait for the body outcome
    pub async fn body_settled(&self) -> BodyOutcome {
        self.body.settled().await
    }

    /// Wait for the author identity
    pub async fn identity_settled(&self) -> AuthorIdentity {
        self.identity.settled().await
    }

    /// Wait for both asynchronous fields and take a snapshot
    pub async fn settled(&self) -> PostSnapshot {
        let _ = tokio::join!(self.body.settled(), self.identity.settled());
        self.snapshot()
    }

    /// Point-in-time copy for rendering
    #[must_use]
    pub fn snapshot(&self) -> PostSnapshot {
        let body = self.body.get();
        PostSnapshot {
            id: self.id.clone(),
            author: self.author.clone(),
            topic: self.topic.clone(),
            confirmation_height: self.confirmation_height(),
            submitted_at_millis: self.submitted_at_millis(),
            byte_length: self.byte_length,
            body: body.clone().and_then(Result::ok),
            body_fetch_error: body.and_then(Result::err).map(|e| e.to_string()),
            author_display: self.identity.get().map(|i| i.display_name().to_string()),
        }
    }

    /// Notify a consumer once both asynchronous fields settle
    ///
    /// The callback is skipped if `guard` has been torn down by then. The
    /// post itself still settles either way.
    pub fn watch<F>(self: &Arc<Self>, guard: &ConsumerGuard, on_settled: F) -> JoinHandle<()>
    where
        F: FnOnce(PostSnapshot) + Send + 'static,
    {
        let post = Arc::clone(self);
        deliver(self.id.clone(), guard, async move { post.settled().await }, on_settled)
    }

    /// Notify a consumer once the body outcome is known
    ///
    /// Same teardown rule as [`Post::watch`].
    pub fn watch_body<F>(&self, guard: &ConsumerGuard, on_body: F) -> JoinHandle<()>
    where
        F: FnOnce(BodyOutcome) + Send + 'static,
    {
        let body = Arc::clone(&self.body);
        deliver(self.id.clone(), guard, async move { body.settled().await }, on_body)
    }

    /// Notify a consumer once the author identity is known
    ///
    /// Same teardown rule as [`Post::watch`].
    pub fn watch_identity<F>(&self, guard: &ConsumerGuard, on_identity: F) -> JoinHandle<()>
    where
        F: FnOnce(AuthorIdentity) + Send + 'static,
    {
        let identity = Arc::clone(&self.identity);
        deliver(self.id.clone(), guard, async move { identity.settled().await }, on_identity)
    }
}

fn deliver<T, S, F>(id: TxId, guard: &ConsumerGuard, settle: S, callback: F) -> JoinHandle<()>
where
    S: std::future::Future<Output = T> + Send + 'static,
    F: FnOnce(T) + Send + 'static,
    T: Send + 'static,
{
    let token = guard.token();
    tokio::spawn(async move {
        let value = settle.await;
        if token.is_cancelled() {
            tracing::debug!(%id, "consumer gone, settlement not delivered");
            return;
        }
        callback(value);
    })
}

/// Rendering copy of a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSnapshot {
    /// Transaction id
    pub id: TxId,
    /// Author address
    pub author: Address,
    /// Topic
    pub topic: Option<String>,
    /// Block height or -1
    pub confirmation_height: i64,
    /// Milliseconds since epoch or -1
    pub submitted_at_millis: i64,
    /// Declared body size
    pub byte_length: u64,
    /// Body, if fetched
    pub body: Option<String>,
    /// Failure reason shown in place of the body
    pub body_fetch_error: Option<String>,
    /// Display name or abbreviated address
    pub author_display: Option<String>,
}

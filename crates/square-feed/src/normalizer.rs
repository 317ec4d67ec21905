//! Post record normalizer
//!
//! Maps raw records to [`Post`] entities and starts two background fetches
//! per new post: the body from the content gateway and the author identity
//! from the profile directory. Normalization returns immediately; the fetches
//! settle the post's slots whenever they complete, in any order.

use crate::post::{BodyOutcome, Confirmation, Post};
use crate::profile::ProfileDirectory;
use square_ledger::{ContentFetchFailure, ContentGateway, GatewayResponse, RawRecord, TxId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Body fetch policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Bounded wait for one body
    pub body_timeout: Duration,
    /// Delay before re-asking for a pending body
    pub pending_retry: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            body_timeout: Duration::from_secs(10),
            pending_retry: Duration::from_secs(1),
        }
    }
}

/// Posts from an earlier page, by id
pub type PostIndex = HashMap<TxId, Arc<Post>>;

/// Index posts by id
#[must_use]
pub fn index_posts(posts: &[Arc<Post>]) -> PostIndex {
    posts
        .iter()
        .map(|post| (post.id().clone(), Arc::clone(post)))
        .collect()
}

/// Fetch one body within `policy`'s bounded wait
///
/// A pending response is a soft absence: the gateway is asked again after
/// `pending_retry` until the bound runs out.
pub async fn fetch_body(gateway: &dyn ContentGateway, id: &TxId, policy: FetchPolicy) -> BodyOutcome {
    let attempt = async {
        loop {
            match gateway.fetch(id).await? {
                GatewayResponse::Ready(bytes) => {
                    return Ok(String::from_utf8_lossy(&bytes).into_owned());
                }
                GatewayResponse::Pending => tokio::time::sleep(policy.pending_retry).await,
                GatewayResponse::NotFound => return Err(ContentFetchFailure::NotFound),
            }
        }
    };

    match tokio::time::timeout(policy.body_timeout, attempt).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ContentFetchFailure::Timeout {
            millis: u64::try_from(policy.body_timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Raw record to post mapper
///
/// Must be used from within a tokio runtime; fetches are spawned as tasks.
#[derive(Clone)]
pub struct Normalizer {
    gateway: Arc<dyn ContentGateway>,
    profiles: ProfileDirectory,
    policy: FetchPolicy,
}

impl Normalizer {
    /// Create normalizer
    #[must_use]
    pub fn new(gateway: Arc<dyn ContentGateway>, profiles: ProfileDirectory, policy: FetchPolicy) -> Self {
        Self {
            gateway,
            profiles,
            policy,
        }
    }

    /// Body fetch policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    /// Normalize one record and start its background fetches
    pub fn normalize(&self, record: &RawRecord) -> Arc<Post> {
        let post = Arc::new(Post::from_record(record));
        self.spawn_fetches(&post);
        post
    }

    /// Normalize a page, reusing posts already known from `previous`
    ///
    /// A known post keeps its settled or in-flight fetches; only its
    /// confirmation may move forward. Repeated ids within the page are
    /// dropped after their first occurrence.
    pub fn normalize_page(&self, records: &[RawRecord], previous: &PostIndex) -> Vec<Arc<Post>> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut posts = Vec::with_capacity(records.len());

        for record in records {
            if !seen.insert(record.id.clone()) {
                debug!(id = %record.id, "duplicate id in page dropped");
                continue;
            }

            let post = match previous.get(&record.id) {
                Some(known) => reuse(known, record),
                None => self.normalize(record),
            };
            posts.push(post);
        }

        posts
    }

    fn spawn_fetches(&self, post: &Arc<Post>) {
        let gateway = Arc::clone(&self.gateway);
        let policy = self.policy;
        let body_post = Arc::clone(post);
        tokio::spawn(async move {
            let outcome = fetch_body(gateway.as_ref(), body_post.id(), policy).await;
            if let Err(err) = &outcome {
                warn!(id = %body_post.id(), error = %err, "body fetch failed");
            }
            body_post.resolve_body(outcome);
            debug!(id = %body_post.id(), "body settled");
        });

        let profiles = self.profiles.clone();
        let identity_post = Arc::clone(post);
        tokio::spawn(async move {
            let identity = profiles.resolve(identity_post.author()).await;
            identity_post.resolve_identity(identity);
            debug!(id = %identity_post.id(), "author identity settled");
        });
    }
}

fn reuse(known: &Arc<Post>, record: &RawRecord) -> Arc<Post> {
    let observed = Confirmation::from_block(record.block.as_ref());
    let next = known.confirmation().advance(observed);
    if next == known.confirmation() {
        Arc::clone(known)
    } else {
        debug!(id = %known.id(), "post confirmed");
        Arc::new(known.with_confirmation(next))
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

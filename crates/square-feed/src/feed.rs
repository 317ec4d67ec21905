//! Feed coordinator
//!
//! The [`Feed`] is the single owner of the post collection:
//! - `load` queries a page and replaces the collection
//! - `await_post` polls for a submitted post and installs the reordered page;
//!   every call runs its own [`NewPostPoller`]
//! - `publish` hands a draft to the wallet, then polls for it
//!
//! Services are injected through [`Services`]; nothing here reaches for
//! process globals.

use crate::config::SquareConfig;
use crate::error::FeedError;
use crate::normalizer::{index_posts, Normalizer};
use crate::poller::{NewPostPoller, PollOutcome, PollPolicy};
use crate::post::{Post, PostSnapshot};
use crate::profile::{AccountProfileLookup, ProfileDirectory};
use futures::future::join_all;
use parking_lot::RwLock;
use square_ledger::{ContentGateway, GraphqlClient, HttpGateway, LedgerQuery, PostFilter, TxId};
use square_wallet::{PostDraft, Signer};
use std::sync::Arc;
use tracing::{info, instrument};

/// External services the feed depends on
#[derive(Clone)]
pub struct Services {
    /// Ledger query client
    pub ledger: Arc<dyn LedgerQuery>,
    /// Content gateway for post bodies
    pub gateway: Arc<dyn ContentGateway>,
    /// Shared profile directory
    pub profiles: ProfileDirectory,
}

impl Services {
    /// Bundle explicit service instances
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerQuery>, gateway: Arc<dyn ContentGateway>, profiles: ProfileDirectory) -> Self {
        Self {
            ledger,
            gateway,
            profiles,
        }
    }

    /// Network-backed services for `config`
    #[must_use]
    pub fn from_config(config: &SquareConfig) -> Self {
        let ledger: Arc<dyn LedgerQuery> = Arc::new(GraphqlClient::new(config.graphql_url.clone()));
        let gateway: Arc<dyn ContentGateway> = Arc::new(HttpGateway::new(config.gateway_url.clone()));
        let lookup = Arc::new(AccountProfileLookup::new(
            Arc::clone(&ledger),
            Arc::clone(&gateway),
        ));
        let profiles = ProfileDirectory::with_ttl(
            lookup,
            config.profile_cache_capacity,
            config.profile_cache_ttl(),
        )
        .with_lookup_timeout(config.profile_timeout());
        Self::new(ledger, gateway, profiles)
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("profiles", &self.profiles)
            .finish_non_exhaustive()
    }
}

/// Post collection owner
pub struct Feed {
    ledger: Arc<dyn LedgerQuery>,
    normalizer: Normalizer,
    poll_policy: PollPolicy,
    page_size: u32,
    posts: RwLock<Vec<Arc<Post>>>,
}

impl Feed {
    /// Create an empty feed over `services`
    #[must_use]
    pub fn new(services: Services, config: &SquareConfig) -> Self {
        let normalizer = Normalizer::new(services.gateway, services.profiles, config.fetch_policy());

        Self {
            ledger: services.ledger,
            normalizer,
            poll_policy: config.poll_policy(),
            page_size: config.page_size,
            posts: RwLock::new(Vec::new()),
        }
    }

    /// Filter for a default-sized page of all posts
    #[inline]
    #[must_use]
    pub fn default_filter(&self) -> PostFilter {
        PostFilter::new().with_count(self.page_size)
    }

    /// Load one page and make it the collection
    ///
    /// Query failures leave the current collection untouched. Posts already
    /// in the collection are reused rather than fetched again.
    #[instrument(skip(self), fields(topic = ?filter.topic, author = ?filter.author))]
    pub async fn load(&self, filter: &PostFilter) -> Result<Vec<Arc<Post>>, FeedError> {
        let records = self.ledger.query(&filter.build()).await?;
        let previous = index_posts(&self.posts.read());
        let page = self.normalizer.normalize_page(&records, &previous);

        info!(count = page.len(), "page loaded");
        *self.posts.write() = page.clone();
        Ok(page)
    }

    /// Fresh poller for one submitted post
    ///
    /// Callers that want to observe poll state create the poller here, then
    /// drive it with [`Feed::await_with`].
    #[must_use]
    pub fn new_poller(&self) -> NewPostPoller {
        NewPostPoller::new(Arc::clone(&self.ledger), self.normalizer.clone(), self.poll_policy)
    }

    /// Poll until `target` appears in the page selected by `filter`
    ///
    /// On success the page, with `target` first, becomes the collection.
    pub async fn await_post(&self, target: &TxId, filter: &PostFilter) -> Result<PollOutcome, FeedError> {
        self.await_with(&self.new_poller(), target, filter).await
    }

    /// Like [`Feed::await_post`], driving a caller-held `poller`
    pub async fn await_with(
        &self,
        poller: &NewPostPoller,
        target: &TxId,
        filter: &PostFilter,
    ) -> Result<PollOutcome, FeedError> {
        let outcome = poller.poll_until_found(target, filter).await?;
        *self.posts.write() = outcome.posts.clone();
        Ok(outcome)
    }

    /// Submit `draft` through `signer`, then wait for it to be indexed
    ///
    /// Polling never starts when the wallet does not accept the draft.
    #[instrument(skip_all, fields(provider = signer.provider().name()))]
    pub async fn publish(&self, signer: &dyn Signer, draft: &PostDraft, filter: &PostFilter) -> Result<PollOutcome, FeedError> {
        draft.validate()?;
        let id = signer.dispatch(draft).await?;
        info!(%id, "post submitted, waiting for it to be indexed");
        self.await_post(&id, filter).await
    }

    /// Current collection
    #[must_use]
    pub fn posts(&self) -> Vec<Arc<Post>> {
        self.posts.read().clone()
    }

    /// Wait for every post in the collection to settle
    ///
    /// Snapshots come back in collection order.
    pub async fn settled(&self) -> Vec<PostSnapshot> {
        let posts = self.posts();
        join_all(posts.iter().map(|post| post.settled())).await
    }

    /// Post with `id`, if in the collection
    #[must_use]
    pub fn get(&self, id: &TxId) -> Option<Arc<Post>> {
        self.posts.read().iter().find(|p| p.id() == id).cloned()
    }

    /// Collection size
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.read().len()
    }

    /// Whether the collection is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.read().is_empty()
    }
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("page_size", &self.page_size)
            .field("posts", &self.len())
            .field("poll_policy", &self.poll_policy)
            .finish_non_exhaustive()
    }
}

//! Testing utilities for the Public Square workspace
//!
//! In-memory stand-ins for every external service, plus record fixtures.
//! All fakes are scriptable up front and count the calls they receive.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use square_feed::{AuthorProfile, ProfileDirectory, ProfileError, ProfileLookup, Services};
use square_ledger::{
    Address, BlockRef, ContentFetchFailure, ContentGateway, FilterDescription, GatewayResponse,
    LedgerQuery, QueryFailure, RawRecord, Tags, TxId, APP_NAME, APP_NAME_TAG, CONTENT_TYPE,
    CONTENT_TYPE_TAG, TOPIC_TAG,
};
use square_wallet::{PostDraft, Signer, SubmissionFailure, WalletProvider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Base URL reported by [`StaticGateway::resource_url`]
pub const GATEWAY_BASE: &str = "https://gateway.test";

/// Fixture builder for [`RawRecord`]
///
/// Records carry the Public Square protocol tags unless [`bare`](Self::bare)
/// is called.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    id: String,
    owner: String,
    block: Option<BlockRef>,
    data_size: u64,
    protocol_tags: bool,
    extra: Vec<(String, String)>,
}

impl RecordBuilder {
    pub fn new(id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            block: None,
            data_size: 0,
            protocol_tags: true,
            extra: Vec::new(),
        }
    }

    #[must_use]
    pub fn topic(self, topic: impl Into<String>) -> Self {
        self.tag(TOPIC_TAG, topic)
    }

    #[must_use]
    pub fn size(mut self, bytes: u64) -> Self {
        self.data_size = bytes;
        self
    }

    #[must_use]
    pub fn confirmed(mut self, height: u64, timestamp: u64) -> Self {
        self.block = Some(BlockRef { height, timestamp });
        self
    }

    #[must_use]
    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    /// Drop the protocol tags
    #[must_use]
    pub fn bare(mut self) -> Self {
        self.protocol_tags = false;
        self
    }

    #[must_use]
    pub fn build(self) -> RawRecord {
        let mut tags = Tags::new();
        if self.protocol_tags {
            tags.push(APP_NAME_TAG, APP_NAME);
            tags.push(CONTENT_TYPE_TAG, CONTENT_TYPE);
        }
        for (name, value) in self.extra {
            tags.push(name, value);
        }

        RawRecord {
            id: TxId::new(self.id),
            owner: Address::new(self.owner),
            block: self.block,
            data_size: self.data_size,
            tags,
        }
    }
}

#[derive(Debug, Clone)]
enum LedgerStep {
    Records(Vec<RawRecord>),
    Status(u16),
}

/// Query service that replays a script
///
/// Each call consumes one step; the last step repeats once the script runs
/// out. An empty script answers every query with no records. Records are
/// filtered and truncated the way the real service does.
#[derive(Debug, Default)]
pub struct ScriptedLedger {
    steps: Mutex<Vec<LedgerStep>>,
    cursor: AtomicUsize,
    filters: Mutex<Vec<FilterDescription>>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger answering every query from the same records
    pub fn with_records(records: Vec<RawRecord>) -> Self {
        Self::new().then_records(records)
    }

    #[must_use]
    pub fn then_records(self, records: Vec<RawRecord>) -> Self {
        self.steps.lock().push(LedgerStep::Records(records));
        self
    }

    /// Next query fails with HTTP `status`
    #[must_use]
    pub fn then_status(self, status: u16) -> Self {
        self.steps.lock().push(LedgerStep::Status(status));
        self
    }

    pub fn calls(&self) -> usize {
        self.filters.lock().len()
    }

    pub fn last_filter(&self) -> Option<FilterDescription> {
        self.filters.lock().last().cloned()
    }

    fn next_step(&self) -> Option<LedgerStep> {
        let steps = self.steps.lock();
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        steps.get(index).or_else(|| steps.last()).cloned()
    }
}

#[async_trait]
impl LedgerQuery for ScriptedLedger {
    async fn query(&self, filter: &FilterDescription) -> Result<Vec<RawRecord>, QueryFailure> {
        self.filters.lock().push(filter.clone());

        match self.next_step() {
            None => Ok(Vec::new()),
            Some(LedgerStep::Status(status)) => Err(QueryFailure::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            Some(LedgerStep::Records(records)) => Ok(records
                .into_iter()
                .filter(|r| filter.matches(r))
                .take(filter.first() as usize)
                .collect()),
        }
    }
}

#[derive(Debug, Clone)]
enum Content {
    Ready(Vec<u8>),
    Pending,
    PendingThen { remaining: usize, body: Vec<u8> },
    Hang,
    Status(u16),
}

/// Content gateway serving canned bodies
///
/// Clones share content and request counters. Unknown ids are not found.
#[derive(Debug, Clone, Default)]
pub struct StaticGateway {
    content: Arc<Mutex<HashMap<String, Content>>>,
    requests: Arc<Mutex<HashMap<String, usize>>>,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ready(self, id: impl Into<String>, body: impl Into<String>) -> Self {
        self.set(id, Content::Ready(body.into().into_bytes()))
    }

    /// Always answers 202
    #[must_use]
    pub fn pending(self, id: impl Into<String>) -> Self {
        self.set(id, Content::Pending)
    }

    /// Answers 202 `times` times, then the body
    #[must_use]
    pub fn pending_then_ready(self, id: impl Into<String>, times: usize, body: impl Into<String>) -> Self {
        self.set(
            id,
            Content::PendingThen {
                remaining: times,
                body: body.into().into_bytes(),
            },
        )
    }

    /// Never answers
    #[must_use]
    pub fn hang(self, id: impl Into<String>) -> Self {
        self.set(id, Content::Hang)
    }

    #[must_use]
    pub fn status(self, id: impl Into<String>, status: u16) -> Self {
        self.set(id, Content::Status(status))
    }

    pub fn requests(&self, id: &str) -> usize {
        self.requests.lock().get(id).copied().unwrap_or(0)
    }

    fn set(self, id: impl Into<String>, content: Content) -> Self {
        self.content.lock().insert(id.into(), content);
        self
    }

    fn next_content(&self, id: &str) -> Option<Content> {
        *self.requests.lock().entry(id.to_string()).or_insert(0) += 1;

        let mut content = self.content.lock();
        let entry = content.get_mut(id)?;
        if let Content::PendingThen { remaining, body } = entry {
            if *remaining == 0 {
                return Some(Content::Ready(body.clone()));
            }
            *remaining -= 1;
            return Some(Content::Pending);
        }
        Some(entry.clone())
    }
}

#[async_trait]
impl ContentGateway for StaticGateway {
    async fn fetch(&self, id: &TxId) -> Result<GatewayResponse, ContentFetchFailure> {
        match self.next_content(id.as_str()) {
            None => Ok(GatewayResponse::NotFound),
            Some(Content::Ready(bytes)) => Ok(GatewayResponse::Ready(bytes)),
            Some(Content::Pending | Content::PendingThen { .. }) => Ok(GatewayResponse::Pending),
            Some(Content::Status(status)) => Err(ContentFetchFailure::Status(status)),
            Some(Content::Hang) => futures::future::pending().await,
        }
    }

    fn resource_url(&self, id: &str) -> String {
        format!("{GATEWAY_BASE}/{id}")
    }
}

#[derive(Debug, Clone)]
enum ProfileEntry {
    Found(AuthorProfile),
    Failing,
}

/// Profile lookup backed by a fixed table
///
/// Addresses not in the table have no profile.
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles {
    entries: Arc<Mutex<HashMap<Address, ProfileEntry>>>,
    lookups: Arc<AtomicUsize>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a profile for `address`
    #[must_use]
    pub fn with(self, address: impl Into<Address>, display_name: &str, handle: &str) -> Self {
        self.entries.lock().insert(
            address.into(),
            ProfileEntry::Found(AuthorProfile {
                display_name: display_name.to_string(),
                handle: format!("@{handle}"),
                avatar_url: None,
            }),
        );
        self
    }

    /// Lookups for `address` fail
    #[must_use]
    pub fn failing(self, address: impl Into<Address>) -> Self {
        self.entries.lock().insert(address.into(), ProfileEntry::Failing);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileLookup for StaticProfiles {
    async fn lookup(&self, address: &Address) -> Result<Option<AuthorProfile>, ProfileError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        match self.entries.lock().get(address).cloned() {
            None => Ok(None),
            Some(ProfileEntry::Found(profile)) => Ok(Some(profile)),
            Some(ProfileEntry::Failing) => Err(ProfileError::Query(QueryFailure::Status {
                status: 503,
                body: "profile service down".to_string(),
            })),
        }
    }
}

/// Wallet stand-in
///
/// Accepts drafts with a fixed id, or rejects them as a user would.
#[derive(Debug)]
pub struct FakeSigner {
    address: Address,
    outcome: Result<TxId, String>,
    drafts: Mutex<Vec<PostDraft>>,
}

impl FakeSigner {
    /// Signer assigning `id` to the next dispatched draft
    pub fn accepting(id: impl Into<String>) -> Self {
        Self {
            address: Address::new("fake-signer-address"),
            outcome: Ok(TxId::new(id)),
            drafts: Mutex::new(Vec::new()),
        }
    }

    /// Signer whose user declines every draft
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            address: Address::new("fake-signer-address"),
            outcome: Err(message.into()),
            drafts: Mutex::new(Vec::new()),
        }
    }

    pub fn drafts(&self) -> Vec<PostDraft> {
        self.drafts.lock().clone()
    }
}

#[async_trait]
impl Signer for FakeSigner {
    fn provider(&self) -> WalletProvider {
        WalletProvider::ArConnect
    }

    async fn connect(&self) -> Result<(), SubmissionFailure> {
        Ok(())
    }

    async fn active_address(&self) -> Result<Address, SubmissionFailure> {
        Ok(self.address.clone())
    }

    async fn dispatch(&self, draft: &PostDraft) -> Result<TxId, SubmissionFailure> {
        self.drafts.lock().push(draft.clone());
        self.outcome.clone().map_err(SubmissionFailure::Rejected)
    }
}

/// Feed services over in-memory fakes
pub fn services(ledger: Arc<ScriptedLedger>, gateway: StaticGateway, profiles: StaticProfiles) -> Services {
    Services::new(
        ledger,
        Arc::new(gateway),
        ProfileDirectory::new(Arc::new(profiles), 1_000),
    )
}

//! Author profiles
//!
//! Profiles come from the Account protocol: an author publishes a JSON
//! document tagged `Protocol-Name: Account-0.3`, and the newest such record
//! owned by an address is that address's profile. An author without one is
//! shown under an abbreviated address instead; that is a normal outcome,
//! not an error.
//!
//! Lookups go through a single [`ProfileDirectory`] so every post by the
//! same author shares one cached resolution.

use crate::error::ProfileError;
use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use square_ledger::{Address, ContentGateway, FilterDescription, GatewayResponse, LedgerQuery};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tag naming the Account protocol
pub const PROTOCOL_NAME_TAG: &str = "Protocol-Name";

/// Account protocol version read by this client
pub const ACCOUNT_PROTOCOL: &str = "Account-0.3";

/// Characters kept on each side of an abbreviated address
pub const ABBREVIATION_CHARS: usize = 5;

const ELLIPSIS: &str = "...";

/// Shorten an address to its head and tail joined by an ellipsis
///
/// Each side keeps at most [`ABBREVIATION_CHARS`] characters and never more
/// than half the address, so short addresses still read as abbreviated.
#[must_use]
pub fn abbreviate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    let keep = ABBREVIATION_CHARS.min(chars.len() / 2);
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{head}{ELLIPSIS}{tail}")
}

/// Published author profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    /// Display name
    pub display_name: String,
    /// Handle, `@`-prefixed
    pub handle: String,
    /// Avatar image URL
    pub avatar_url: Option<String>,
}

/// Resolved author identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorIdentity {
    /// Author has a published profile
    Profile(AuthorProfile),
    /// No profile; shown by abbreviated address
    Fallback {
        /// Abbreviated address
        abbreviated: String,
    },
}

impl AuthorIdentity {
    /// Fallback identity for `address`
    #[inline]
    #[must_use]
    pub fn fallback_for(address: &Address) -> Self {
        Self::Fallback {
            abbreviated: abbreviate_address(address.as_str()),
        }
    }

    /// Name to render
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Profile(profile) => &profile.display_name,
            Self::Fallback { abbreviated } => abbreviated,
        }
    }

    /// Handle to render
    #[must_use]
    pub fn handle(&self) -> &str {
        match self {
            Self::Profile(profile) => &profile.handle,
            Self::Fallback { abbreviated } => abbreviated,
        }
    }

    /// Avatar URL, if any
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        match self {
            Self::Profile(profile) => profile.avatar_url.as_deref(),
            Self::Fallback { .. } => None,
        }
    }

    /// Whether this is the abbreviated-address fallback
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Profile lookup seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Profile published by `address`, if any
    async fn lookup(&self, address: &Address) -> Result<Option<AuthorProfile>, ProfileError>;
}

/// Account document as published on the ledger
#[derive(Debug, Deserialize)]
struct AccountDocument {
    handle: Option<String>,
    name: Option<String>,
    avatar: Option<String>,
}

/// Account protocol lookup over the ledger
pub struct AccountProfileLookup {
    ledger: Arc<dyn LedgerQuery>,
    gateway: Arc<dyn ContentGateway>,
}

impl AccountProfileLookup {
    /// Create lookup reading account records through `ledger` and `gateway`
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerQuery>, gateway: Arc<dyn ContentGateway>) -> Self {
        Self { ledger, gateway }
    }

    fn avatar_url(&self, avatar: Option<String>) -> Option<String> {
        let avatar = avatar?;
        if let Some(id) = avatar.strip_prefix("ar://") {
            return (!id.is_empty()).then(|| self.gateway.resource_url(id));
        }
        (avatar.starts_with("https://") || avatar.starts_with("http://")).then_some(avatar)
    }

    fn profile_from(&self, address: &Address, document: AccountDocument) -> Option<AuthorProfile> {
        let handle = document
            .handle
            .map(|h| h.trim().trim_start_matches('@').to_string())
            .filter(|h| !h.is_empty())?;

        let display_name = document
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| handle.clone());

        debug!(%address, %handle, "account profile found");
        Some(AuthorProfile {
            display_name,
            handle: format!("@{handle}"),
            avatar_url: self.avatar_url(document.avatar),
        })
    }
}

#[async_trait]
impl ProfileLookup for AccountProfileLookup {
    async fn lookup(&self, address: &Address) -> Result<Option<AuthorProfile>, ProfileError> {
        let filter = FilterDescription::new(1)
            .with_owner(address.clone())
            .with_tag(PROTOCOL_NAME_TAG, ACCOUNT_PROTOCOL);

        let Some(record) = self.ledger.query(&filter).await?.into_iter().next() else {
            return Ok(None);
        };

        match self.gateway.fetch(&record.id).await? {
            GatewayResponse::Ready(bytes) => {
                let document: AccountDocument = serde_json::from_slice(&bytes)?;
                Ok(self.profile_from(address, document))
            }
            GatewayResponse::Pending | GatewayResponse::NotFound => Ok(None),
        }
    }
}

/// Default bound on one profile lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Process-wide profile resolver with caching
///
/// Concurrent requests for the same address share one lookup. Each lookup is
/// bounded by a timeout. Failed or timed-out lookups resolve to the fallback
/// identity without being cached, so a later request tries again.
#[derive(Clone)]
pub struct ProfileDirectory {
    lookup: Arc<dyn ProfileLookup>,
    cache: Cache<Address, AuthorIdentity>,
    lookup_timeout: Duration,
}

impl ProfileDirectory {
    /// Create directory caching up to `capacity` identities
    #[inline]
    #[must_use]
    pub fn new(lookup: Arc<dyn ProfileLookup>, capacity: u64) -> Self {
        Self {
            lookup,
            cache: Cache::new(capacity),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Create directory whose entries expire after `ttl`
    #[inline]
    #[must_use]
    pub fn with_ttl(lookup: Arc<dyn ProfileLookup>, capacity: u64, ttl: Duration) -> Self {
        Self {
            lookup,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// With a different bound on each lookup
    #[inline]
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Bound on each lookup
    #[inline]
    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    /// Resolve `address` to a profile or the fallback identity
    pub async fn resolve(&self, address: &Address) -> AuthorIdentity {
        let bound = self.lookup_timeout;
        let lookup = async {
            let found = tokio::time::timeout(bound, self.lookup.lookup(address))
                .await
                .map_err(|_| ProfileError::Timeout {
                    millis: u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
                })??;
            let identity = match found {
                Some(profile) => AuthorIdentity::Profile(profile),
                None => AuthorIdentity::fallback_for(address),
            };
            Ok::<_, ProfileError>(identity)
        };

        match self.cache.try_get_with_by_ref(address, lookup).await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(%address, error = %err, "profile lookup failed, using fallback");
                AuthorIdentity::fallback_for(address)
            }
        }
    }

    /// Approximate number of cached identities
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl std::fmt::Debug for ProfileDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileDirectory")
            .field("entry_count", &self.cache.entry_count())
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use square_ledger::{QueryFailure, TxId};
    use square_test_utils::{RecordBuilder, ScriptedLedger, StaticGateway};

    fn profile(name: &str) -> AuthorProfile {
        AuthorProfile {
            display_name: name.to_string(),
            handle: format!("@{}", name.to_lowercase()),
            avatar_url: None,
        }
    }

    #[test]
    fn abbreviates_long_address() {
        let address = "hKMMPNh_emBf8v_at1tFzNYACisyMQNcKzeeE1QE9p8";
        assert_eq!(abbreviate_address(address), "hKMMP...QE9p8");
    }

    #[test]
    fn abbreviates_short_address() {
        assert_eq!(abbreviate_address("abc123"), "abc...123");
        assert_eq!(abbreviate_address(""), "...");
    }

    #[test]
    fn fallback_identity_renders_abbreviation() {
        let identity = AuthorIdentity::fallback_for(&Address::new("abc123"));

        assert!(identity.is_fallback());
        assert_eq!(identity.display_name(), "abc...123");
        assert_eq!(identity.handle(), "abc...123");
        assert_eq!(identity.avatar_url(), None);
    }

    #[tokio::test]
    async fn directory_returns_profile() {
        let mut lookup = MockProfileLookup::new();
        lookup
            .expect_lookup()
            .returning(|_| Ok(Some(profile("Ada"))));

        let directory = ProfileDirectory::new(Arc::new(lookup), 100);
        let identity = directory.resolve(&Address::new("ada-addr")).await;

        assert_eq!(identity, AuthorIdentity::Profile(profile("Ada")));
    }

    #[tokio::test]
    async fn directory_falls_back_when_absent() {
        let mut lookup = MockProfileLookup::new();
        lookup.expect_lookup().returning(|_| Ok(None));

        let directory = ProfileDirectory::new(Arc::new(lookup), 100);
        let identity = directory.resolve(&Address::new("abc123")).await;

        assert_eq!(identity.display_name(), "abc...123");
    }

    #[tokio::test]
    async fn directory_caches_per_address() {
        let mut lookup = MockProfileLookup::new();
        lookup
            .expect_lookup()
            .times(1)
            .returning(|_| Ok(Some(profile("Ada"))));

        let directory = ProfileDirectory::new(Arc::new(lookup), 100);
        let address = Address::new("ada-addr");

        directory.resolve(&address).await;
        directory.resolve(&address).await;
    }

    #[tokio::test]
    async fn directory_does_not_cache_failures() {
        let mut lookup = MockProfileLookup::new();
        lookup.expect_lookup().times(2).returning(|_| {
            Err(ProfileError::Query(QueryFailure::Status {
                status: 503,
                body: String::new(),
            }))
        });

        let directory = ProfileDirectory::new(Arc::new(lookup), 100);
        let address = Address::new("abc123");

        assert!(directory.resolve(&address).await.is_fallback());
        assert!(directory.resolve(&address).await.is_fallback());
    }

    fn account_lookup(document: &str) -> AccountProfileLookup {
        let record = RecordBuilder::new("acct-1", "ada-addr")
            .bare()
            .tag(PROTOCOL_NAME_TAG, ACCOUNT_PROTOCOL)
            .build();
        let ledger = ScriptedLedger::with_records(vec![record]);
        let gateway = StaticGateway::new().ready("acct-1", document);
        AccountProfileLookup::new(Arc::new(ledger), Arc::new(gateway))
    }

    #[tokio::test]
    async fn account_lookup_reads_document() {
        let lookup = account_lookup(r#"{"handle":"ada","name":"Ada L.","avatar":"ar://img-1"}"#);

        let profile = lookup.lookup(&Address::new("ada-addr")).await.unwrap().unwrap();

        assert_eq!(profile.display_name, "Ada L.");
        assert_eq!(profile.handle, "@ada");
        assert_eq!(profile.avatar_url.as_deref(), Some("https://gateway.test/img-1"));
    }

    #[tokio::test]
    async fn account_lookup_without_handle_is_absent() {
        let lookup = account_lookup(r#"{"name":"Nameless"}"#);
        assert_eq!(lookup.lookup(&Address::new("ada-addr")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn account_lookup_ignores_other_owners() {
        let lookup = account_lookup(r#"{"handle":"ada"}"#);
        assert_eq!(lookup.lookup(&Address::new("someone-else")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn account_lookup_rejects_invalid_json() {
        let lookup = account_lookup("not json");
        assert!(matches!(
            lookup.lookup(&Address::new("ada-addr")).await,
            Err(ProfileError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn account_lookup_handles_missing_document() {
        let record = RecordBuilder::new("acct-1", "ada-addr")
            .bare()
            .tag(PROTOCOL_NAME_TAG, ACCOUNT_PROTOCOL)
            .build();
        let lookup = AccountProfileLookup::new(
            Arc::new(ScriptedLedger::with_records(vec![record])),
            Arc::new(StaticGateway::new().pending(TxId::new("acct-1").as_str())),
        );

        assert_eq!(lookup.lookup(&Address::new("ada-addr")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn directory_bounds_stalled_lookup() {
        let record = RecordBuilder::new("acct-1", "ada-addr")
            .bare()
            .tag(PROTOCOL_NAME_TAG, ACCOUNT_PROTOCOL)
            .build();
        let lookup = AccountProfileLookup::new(
            Arc::new(ScriptedLedger::with_records(vec![record])),
            Arc::new(StaticGateway::new().hang("acct-1")),
        );
        let directory =
            ProfileDirectory::new(Arc::new(lookup), 100).with_lookup_timeout(Duration::from_secs(3));
        let address = Address::new("ada-addr");
        let started = tokio::time::Instant::now();

        let identity = directory.resolve(&address).await;

        assert!(identity.is_fallback());
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(directory.cache.get(&address).await, None);
    }
}

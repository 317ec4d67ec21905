//! Feed configuration
//!
//! All tunables of the pipeline in one serde struct. Missing TOML keys fall
//! back to the defaults below.

use crate::error::ConfigError;
use crate::normalizer::FetchPolicy;
use crate::poller::PollPolicy;
use serde::{Deserialize, Serialize};
use square_ledger::MAX_PAGE_SIZE;
use std::path::Path;
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquareConfig {
    /// GraphQL endpoint of the query service
    pub graphql_url: String,
    /// Content gateway base URL
    pub gateway_url: String,
    /// Bounded wait for one post body, in milliseconds
    pub body_timeout_ms: u64,
    /// Delay between re-requests of a pending body, in milliseconds
    pub pending_retry_ms: u64,
    /// New-post poller delay unit, in milliseconds
    pub poll_delay_unit_ms: u64,
    /// Optional cap on poll cycles
    pub poll_max_attempts: Option<u32>,
    /// Give up polling once waiting would exceed this many seconds
    pub poll_expiry_window_secs: u64,
    /// Profile cache capacity (entries)
    pub profile_cache_capacity: u64,
    /// Profile cache time-to-live, in seconds
    pub profile_cache_ttl_secs: u64,
    /// Bounded wait for one profile lookup, in milliseconds
    pub profile_timeout_ms: u64,
    /// Default page size
    pub page_size: u32,
}

impl SquareConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With GraphQL endpoint
    #[inline]
    #[must_use]
    pub fn with_graphql_url(mut self, url: impl Into<String>) -> Self {
        self.graphql_url = url.into();
        self
    }

    /// With gateway base URL
    #[inline]
    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    /// With body timeout
    #[inline]
    #[must_use]
    pub fn with_body_timeout(mut self, timeout: Duration) -> Self {
        self.body_timeout_ms = duration_ms(timeout);
        self
    }

    /// With poll delay unit
    #[inline]
    #[must_use]
    pub fn with_poll_delay_unit(mut self, unit: Duration) -> Self {
        self.poll_delay_unit_ms = duration_ms(unit);
        self
    }

    /// With profile lookup timeout
    #[inline]
    #[must_use]
    pub fn with_profile_timeout(mut self, timeout: Duration) -> Self {
        self.profile_timeout_ms = duration_ms(timeout);
        self
    }

    /// With poll attempt cap
    #[inline]
    #[must_use]
    pub fn with_poll_max_attempts(mut self, attempts: u32) -> Self {
        self.poll_max_attempts = Some(attempts);
        self
    }

    /// Check values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graphql_url.trim().is_empty() {
            return Err(ConfigError::Invalid("graphql_url is empty".to_string()));
        }
        if self.gateway_url.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway_url is empty".to_string()));
        }
        if self.body_timeout_ms == 0 {
            return Err(ConfigError::Invalid("body_timeout_ms must be positive".to_string()));
        }
        if self.pending_retry_ms == 0 {
            return Err(ConfigError::Invalid("pending_retry_ms must be positive".to_string()));
        }
        if self.poll_delay_unit_ms == 0 {
            return Err(ConfigError::Invalid("poll_delay_unit_ms must be positive".to_string()));
        }
        if self.profile_timeout_ms == 0 {
            return Err(ConfigError::Invalid("profile_timeout_ms must be positive".to_string()));
        }
        if self.poll_max_attempts == Some(0) {
            return Err(ConfigError::Invalid("poll_max_attempts must be positive".to_string()));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "page_size {} exceeds {MAX_PAGE_SIZE}",
                self.page_size
            )));
        }
        Ok(())
    }

    /// Body fetch policy
    #[must_use]
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            body_timeout: Duration::from_millis(self.body_timeout_ms),
            pending_retry: Duration::from_millis(self.pending_retry_ms),
        }
    }

    /// New-post poll policy
    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            delay_unit: Duration::from_millis(self.poll_delay_unit_ms),
            max_attempts: self.poll_max_attempts,
            expiry_window: Duration::from_secs(self.poll_expiry_window_secs),
        }
    }

    /// Profile cache time-to-live
    #[inline]
    #[must_use]
    pub fn profile_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_cache_ttl_secs)
    }

    /// Bound on one profile lookup
    #[inline]
    #[must_use]
    pub fn profile_timeout(&self) -> Duration {
        Duration::from_millis(self.profile_timeout_ms)
    }
}

impl Default for SquareConfig {
    fn default() -> Self {
        Self {
            graphql_url: "https://arweave.net/graphql".to_string(),
            gateway_url: "https://arweave.net".to_string(),
            body_timeout_ms: 10_000,
            pending_retry_ms: 1_000,
            poll_delay_unit_ms: 2_000,
            poll_max_attempts: None,
            // 50 blocks at roughly two minutes each
            poll_expiry_window_secs: 6_000,
            profile_cache_capacity: 10_000,
            profile_cache_ttl_secs: 600,
            profile_timeout_ms: 10_000,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

//! Error types for the feed engine
//!
//! - Page loads fail as a whole with [`FeedError::Query`]
//! - Polling ends with [`PollError::Expired`] once its bound is reached, or
//!   with [`PollError::Failed`] when the query service refuses the request
//! - Submission failures stop the pipeline before any polling starts

use square_ledger::{QueryFailure, TxId};
use square_wallet::SubmissionFailure;
use std::path::PathBuf;
use std::time::Duration;

/// Main feed error type
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Page query failed
    #[error("page load failed: {0}")]
    Query(#[from] QueryFailure),

    /// New post never showed up
    #[error(transparent)]
    Poll(#[from] PollError),

    /// Wallet did not accept the post
    #[error("submission failed: {0}")]
    Submission(#[from] SubmissionFailure),
}

/// New-post poller failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// Gave up before the post was indexed
    #[error("post {target} not indexed after {attempts} attempts ({waited:?} waited)")]
    Expired {
        /// Post that was awaited
        target: TxId,
        /// Query cycles issued
        attempts: u32,
        /// Total time spent waiting between cycles
        waited: Duration,
        /// Last query failure seen, if any
        last_failure: Option<String>,
    },

    /// Query service rejected the poll query in a way retrying cannot fix
    #[error("polling for {target} stopped after {attempts} attempts: {reason}")]
    Failed {
        /// Post that was awaited
        target: TxId,
        /// Query cycles issued
        attempts: u32,
        /// Query failure that ended polling
        reason: String,
    },
}

/// Profile lookup failure
///
/// Never surfaces to consumers; the profile directory turns it into the
/// fallback identity.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// Account record query failed
    #[error("profile query failed: {0}")]
    Query(#[from] QueryFailure),

    /// Account document could not be fetched
    #[error("profile document unavailable: {0}")]
    Content(#[from] square_ledger::ContentFetchFailure),

    /// Account document is not valid JSON
    #[error("malformed profile document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Lookup did not finish within its bound
    #[error("profile lookup timed out after {millis}ms")]
    Timeout {
        /// Bound that elapsed
        millis: u64,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or type error
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

//! Error types for ledger access
//!
//! - Query failures abort a page load and reach the caller
//! - Content fetch failures are recorded per post and never abort a page

/// Query service failure
#[derive(Debug, thiserror::Error)]
pub enum QueryFailure {
    /// Transport or body decoding error
    #[error("query transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("query service returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// GraphQL-level errors in an otherwise successful response
    #[error("query service reported errors: {0}")]
    Graphql(String),

    /// Response did not have the expected shape
    #[error("malformed query response: {0}")]
    Malformed(String),
}

impl QueryFailure {
    /// Whether retrying later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Graphql(_) | Self::Malformed(_) => false,
        }
    }
}

/// Body retrieval failure recorded on a post
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentFetchFailure {
    /// No content within the bounded wait
    #[error("timed out after {millis}ms waiting for content")]
    Timeout {
        /// Bound that elapsed
        millis: u64,
    },

    /// Gateway has no data for the id
    #[error("content not found")]
    NotFound,

    /// Unexpected HTTP status
    #[error("gateway returned status {0}")]
    Status(u16),

    /// Transport error
    #[error("gateway request failed: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        let limited = QueryFailure::Status {
            status: 429,
            body: String::new(),
        };
        let unavailable = QueryFailure::Status {
            status: 503,
            body: String::new(),
        };
        let bad_request = QueryFailure::Status {
            status: 400,
            body: String::new(),
        };

        assert!(limited.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!QueryFailure::Malformed("x".into()).is_retryable());
    }

    #[test]
    fn timeout_display_names_duration() {
        let err = ContentFetchFailure::Timeout { millis: 10_000 };
        assert!(err.to_string().contains("10000ms"));
    }
}

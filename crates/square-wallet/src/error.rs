//! Error types for wallet submission

/// Failure talking to the wallet bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// HTTP transport failure
    #[error("bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Wallet answered with an RPC error
    #[error("wallet error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the wallet
        message: String,
    },

    /// Reply did not follow JSON-RPC 2.0
    #[error("invalid bridge response: {0}")]
    InvalidResponse(String),
}

/// Submission failed; no transaction id was assigned
#[derive(Debug, thiserror::Error)]
pub enum SubmissionFailure {
    /// Dispatch attempted before `connect`
    #[error("wallet is not connected")]
    NotConnected,

    /// Post body is empty
    #[error("post body is empty")]
    EmptyBody,

    /// Wallet declined the request
    #[error("wallet rejected the request: {0}")]
    Rejected(String),

    /// Wallet reply lacked an expected field
    #[error("unexpected wallet reply: {0}")]
    MalformedReply(String),

    /// Bridge transport failure
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl SubmissionFailure {
    /// Whether the user declined, as opposed to a technical failure
    #[inline]
    #[must_use]
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

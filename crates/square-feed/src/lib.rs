//! Square Feed - post pipeline for Public Square
//!
//! Turns ledger records into renderable posts:
//! - Normalizes raw records into [`Post`] entities with write-once async fields
//! - Fetches bodies and author profiles in the background, per post
//! - Polls with linear backoff until a freshly submitted post is indexed
//! - Owns the post collection in a single [`Feed`] coordinator
//!
//! # Architecture
//!
//! ```text
//! PostFilter → LedgerQuery → Normalizer ──→ Feed collection
//!                               │   ├─ body task    (ContentGateway)
//!                               │   └─ profile task (ProfileDirectory)
//!                               └── NewPostPoller (linear backoff)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use square_feed::{Feed, Services, SquareConfig};
//! use square_ledger::PostFilter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SquareConfig::default();
//! let feed = Feed::new(Services::from_config(&config), &config);
//!
//! for post in feed.load(&PostFilter::new().with_topic("arweave")).await? {
//!     let snapshot = post.settled().await;
//!     println!("{:?}: {:?}", snapshot.author_display, snapshot.body);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod cancel;
pub mod config;
pub mod error;
pub mod feed;
pub mod normalizer;
pub mod poller;
pub mod post;
pub mod profile;
pub mod slot;

// Re-exports for convenience
pub use cancel::{CancelToken, ConsumerGuard};
pub use config::SquareConfig;
pub use error::{ConfigError, FeedError, PollError, ProfileError};
pub use feed::{Feed, Services};
pub use normalizer::{fetch_body, index_posts, FetchPolicy, Normalizer, PostIndex};
pub use poller::{move_to_front, NewPostPoller, PollOutcome, PollPolicy, PollState};
pub use post::{BodyOutcome, Confirmation, Post, PostSnapshot, UNCONFIRMED};
pub use profile::{
    abbreviate_address, AccountProfileLookup, AuthorIdentity, AuthorProfile, ProfileDirectory,
    ProfileLookup, ACCOUNT_PROTOCOL, PROTOCOL_NAME_TAG,
};
pub use slot::Slot;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the feed
    pub use crate::{
        AuthorIdentity, ConsumerGuard, Feed, FeedError, Post, PostSnapshot, Services, SquareConfig,
    };
    pub use square_ledger::{PostFilter, TxId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

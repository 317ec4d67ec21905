//! Square Ledger - Arweave access for Public Square posts
//!
//! The leaf layer of the feed engine:
//! - Builds filter descriptions for a page of posts
//! - Executes them against the ledger's GraphQL query service
//! - Retrieves raw post bodies from a content gateway
//!
//! # Architecture
//!
//! ```text
//! PostFilter → FilterDescription → LedgerQuery (GraphQL) → Vec<RawRecord>
//!                                  ContentGateway (GET /<id>) → GatewayResponse
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use square_ledger::{GraphqlClient, LedgerQuery, PostFilter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GraphqlClient::new("https://arweave.net/graphql");
//! let filter = PostFilter::new().with_topic("arweave").build();
//!
//! let records = client.query(&filter).await?;
//! println!("{} posts", records.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod client;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod types;

// Re-exports for convenience
pub use client::{GraphqlClient, LedgerQuery, TRANSACTIONS_QUERY};
pub use error::{ContentFetchFailure, QueryFailure};
pub use filter::{
    FilterDescription, PostFilter, TagFilter, APP_NAME, APP_NAME_TAG, CONTENT_TYPE,
    CONTENT_TYPE_TAG, MAX_PAGE_SIZE, TOPIC_TAG,
};
pub use gateway::{ContentGateway, GatewayResponse, HttpGateway};
pub use types::{Address, BlockRef, RawRecord, Tag, Tags, TxId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the ledger layer
    pub use crate::{
        Address, ContentGateway, FilterDescription, GatewayResponse, LedgerQuery, PostFilter,
        RawRecord, TxId,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

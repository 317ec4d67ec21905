//! Ledger query client
//!
//! Executes a [`FilterDescription`] against the Arweave GraphQL endpoint and
//! returns one page of [`RawRecord`]s. Exactly one round trip per call; any
//! retry policy belongs to the caller.

use crate::error::QueryFailure;
use crate::filter::FilterDescription;
use crate::types::{Address, BlockRef, RawRecord, Tag, Tags, TxId};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

/// GraphQL document for one page of tagged transactions
pub const TRANSACTIONS_QUERY: &str = r"query Transactions($first: Int!, $owners: [String!], $tags: [TagFilter!]) {
  transactions(first: $first, owners: $owners, tags: $tags, sort: HEIGHT_DESC) {
    edges {
      node {
        id
        owner { address }
        data { size }
        block { height timestamp }
        tags { name value }
      }
    }
  }
}";

/// Query service seam
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Fetch one page of records matching `filter`, in service order
    async fn query(&self, filter: &FilterDescription) -> Result<Vec<RawRecord>, QueryFailure>;
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<TransactionsData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: TransactionConnection,
}

#[derive(Debug, Deserialize)]
struct TransactionConnection {
    edges: Vec<TransactionEdge>,
}

#[derive(Debug, Deserialize)]
struct TransactionEdge {
    node: TransactionNode,
}

#[derive(Debug, Deserialize)]
struct TransactionNode {
    id: String,
    owner: OwnerNode,
    data: DataNode,
    block: Option<BlockNode>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct OwnerNode {
    address: String,
}

#[derive(Debug, Deserialize)]
struct DataNode {
    size: SizeField,
}

/// Gateways disagree on whether `size` is a string or a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeField {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct BlockNode {
    height: u64,
    timestamp: u64,
}

impl TryFrom<TransactionNode> for RawRecord {
    type Error = QueryFailure;

    fn try_from(node: TransactionNode) -> Result<Self, Self::Error> {
        let data_size = match node.data.size {
            SizeField::Number(size) => size,
            SizeField::Text(text) => text.parse().map_err(|_| {
                QueryFailure::Malformed(format!("data size '{text}' of {} is not a number", node.id))
            })?,
        };

        Ok(RawRecord {
            id: TxId::new(node.id),
            owner: Address::new(node.owner.address),
            block: node.block.map(|b| BlockRef {
                height: b.height,
                timestamp: b.timestamp,
            }),
            data_size,
            tags: Tags::from(node.tags),
        })
    }
}

fn decode_response(payload: GraphqlResponse) -> Result<Vec<RawRecord>, QueryFailure> {
    if let Some(errors) = payload.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(QueryFailure::Graphql(messages.join("; ")));
    }

    let data = payload
        .data
        .ok_or_else(|| QueryFailure::Malformed("response carries no data".to_string()))?;

    data.transactions
        .edges
        .into_iter()
        .map(|edge| RawRecord::try_from(edge.node))
        .collect()
}

/// GraphQL client for the Arweave query service
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    client: Client,
    endpoint: String,
}

impl GraphqlClient {
    /// Create client for `endpoint` (e.g. `https://arweave.net/graphql`)
    #[inline]
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Create client sharing an existing HTTP client
    #[inline]
    #[must_use]
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Endpoint URL
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LedgerQuery for GraphqlClient {
    #[instrument(skip(self, filter), fields(endpoint = %self.endpoint, first = filter.first()))]
    async fn query(&self, filter: &FilterDescription) -> Result<Vec<RawRecord>, QueryFailure> {
        let request = GraphqlRequest {
            query: TRANSACTIONS_QUERY,
            variables: filter.to_variables(),
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GraphqlResponse = response.json().await?;
        let records = decode_response(payload)?;
        debug!(count = records.len(), "query page received");

        Ok(records)
    }
}

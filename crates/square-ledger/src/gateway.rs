//! Content gateway
//!
//! Retrieves raw transaction data by id. A gateway distinguishes data that
//! is ready, data that was accepted but not yet seeded (`202`), and ids it
//! has never seen (`404`).

use crate::error::ContentFetchFailure;
use crate::types::TxId;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::instrument;

/// Outcome of a single gateway request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    /// Data is available
    Ready(Vec<u8>),
    /// Accepted but not yet available; ask again later
    Pending,
    /// Unknown id
    NotFound,
}

/// Content retrieval seam
#[async_trait]
pub trait ContentGateway: Send + Sync {
    /// Request the raw data of `id` once
    async fn fetch(&self, id: &TxId) -> Result<GatewayResponse, ContentFetchFailure>;

    /// Public URL of `id`'s data
    fn resource_url(&self, id: &str) -> String;
}

/// HTTP gateway (e.g. `https://arweave.net`)
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create gateway client for `base_url`
    #[inline]
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create gateway client sharing an existing HTTP client
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL without trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ContentGateway for HttpGateway {
    #[instrument(skip(self), fields(id = %id))]
    async fn fetch(&self, id: &TxId) -> Result<GatewayResponse, ContentFetchFailure> {
        let response = self
            .client
            .get(self.resource_url(id.as_str()))
            .send()
            .await
            .map_err(|e| ContentFetchFailure::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(GatewayResponse::Pending),
            StatusCode::NOT_FOUND => Ok(GatewayResponse::NotFound),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ContentFetchFailure::Transport(e.to_string()))?;
                Ok(GatewayResponse::Ready(bytes.to_vec()))
            }
            status => Err(ContentFetchFailure::Status(status.as_u16())),
        }
    }

    fn resource_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed() {
        let gateway = HttpGateway::new("https://arweave.net/");

        assert_eq!(gateway.base_url(), "https://arweave.net");
        assert_eq!(gateway.resource_url("tx-1"), "https://arweave.net/tx-1");
    }
}

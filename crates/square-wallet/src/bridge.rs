//! Wallet bridge transport
//!
//! Wallet providers are reached through a request/reply bridge. The default
//! bridge speaks JSON-RPC 2.0 over HTTP to a local wallet daemon that relays
//! calls to the provider.

use crate::error::BridgeError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument};

/// Default local wallet daemon URL
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:4318";

/// Raw request/reply channel to a wallet provider
#[async_trait]
pub trait WalletBridge: Send + Sync {
    /// Invoke `method` with `params` and return the provider's result
    async fn call(&self, method: &str, params: Value) -> Result<Value, BridgeError>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 bridge over HTTP
#[derive(Debug)]
pub struct JsonRpcBridge {
    client: Client,
    url: String,
    request_id: AtomicU64,
}

impl JsonRpcBridge {
    /// Bridge to the default local daemon
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(DEFAULT_BRIDGE_URL)
    }

    /// Bridge to a custom endpoint
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            request_id: AtomicU64::new(1),
        }
    }

    /// Endpoint URL
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for JsonRpcBridge {
    fn default() -> Self {
        Self::new()
    }
}

fn unwrap_reply(reply: RpcResponse) -> Result<Value, BridgeError> {
    if let Some(error) = reply.error {
        return Err(BridgeError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    reply
        .result
        .ok_or_else(|| BridgeError::InvalidResponse("missing result".to_string()))
}

#[async_trait]
impl WalletBridge for JsonRpcBridge {
    #[instrument(skip(self, params), fields(url = %self.url))]
    async fn call(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id(),
        };

        let response = self.client.post(&self.url).json(&request).send().await?;
        let reply: RpcResponse = response.json().await?;
        debug!(method, "wallet bridge replied");

        unwrap_reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_ids_increment() {
        let bridge = JsonRpcBridge::with_url("http://localhost:4318/");

        assert_eq!(bridge.url(), "http://localhost:4318");
        assert_eq!(bridge.next_id(), 1);
        assert_eq!(bridge.next_id(), 2);
    }

    #[test]
    fn reply_error_wins_over_result() {
        let reply: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "result": "ignored",
            "error": { "code": 4001, "message": "user rejected" },
            "id": 1
        }))
        .unwrap();

        assert!(matches!(
            unwrap_reply(reply),
            Err(BridgeError::Rpc { code: 4001, .. })
        ));
    }

    #[test]
    fn reply_without_result_is_invalid() {
        let reply: RpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 1 })).unwrap();

        assert!(matches!(
            unwrap_reply(reply),
            Err(BridgeError::InvalidResponse(_))
        ));
    }
}

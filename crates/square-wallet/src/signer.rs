//! Signing providers
//!
//! One trait, two adapters. The providers differ in how they connect
//! (ArConnect asks for an explicit permission list, arweave.app hands back
//! the address on connect) and in the shape of their dispatch request and
//! reply.

use crate::bridge::WalletBridge;
use crate::draft::PostDraft;
use crate::error::{BridgeError, SubmissionFailure};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use square_ledger::{Address, TxId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// RPC error code wallets use when the user declines
const USER_REJECTED: i64 = 4001;

/// Supported wallet providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletProvider {
    /// ArConnect browser extension
    ArConnect,
    /// arweave.app web wallet
    ArweaveApp,
}

impl WalletProvider {
    /// Human-readable provider name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ArConnect => "ArConnect",
            Self::ArweaveApp => "arweave.app",
        }
    }
}

/// ArConnect permissions requested on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Read the active address
    AccessAddress,
    /// Sign transactions
    SignTransaction,
    /// Sign and post transactions through the wallet
    Dispatch,
}

impl Permission {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessAddress => "ACCESS_ADDRESS",
            Self::SignTransaction => "SIGN_TRANSACTION",
            Self::Dispatch => "DISPATCH",
        }
    }
}

/// Common wallet contract
#[async_trait]
pub trait Signer: Send + Sync {
    /// Which provider this adapter talks to
    fn provider(&self) -> WalletProvider;

    /// Ask the wallet for access
    async fn connect(&self) -> Result<(), SubmissionFailure>;

    /// Address of the active wallet key
    async fn active_address(&self) -> Result<Address, SubmissionFailure>;

    /// Sign and post `draft`, returning the id assigned at acceptance
    async fn dispatch(&self, draft: &PostDraft) -> Result<TxId, SubmissionFailure>;
}

fn submission_error(err: BridgeError) -> SubmissionFailure {
    match err {
        BridgeError::Rpc { code, message } if code == USER_REJECTED => {
            SubmissionFailure::Rejected(message)
        }
        other => SubmissionFailure::Bridge(other),
    }
}

fn string_field(reply: &Value, field: &str) -> Result<String, SubmissionFailure> {
    reply
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SubmissionFailure::MalformedReply(format!("missing '{field}' in {reply}")))
}

fn tags_param(draft: &PostDraft) -> Value {
    json!(draft.tags())
}

/// ArConnect adapter
pub struct ArConnectSigner {
    bridge: Arc<dyn WalletBridge>,
    app_name: String,
    permissions: Vec<Permission>,
    connected: AtomicBool,
}

impl ArConnectSigner {
    /// Adapter requesting address, signing and dispatch permissions
    #[must_use]
    pub fn new(bridge: Arc<dyn WalletBridge>, app_name: impl Into<String>) -> Self {
        Self {
            bridge,
            app_name: app_name.into(),
            permissions: vec![
                Permission::AccessAddress,
                Permission::SignTransaction,
                Permission::Dispatch,
            ],
            connected: AtomicBool::new(false),
        }
    }

    /// Permissions requested on connect
    #[inline]
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// Whether `connect` succeeded
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Signer for ArConnectSigner {
    fn provider(&self) -> WalletProvider {
        WalletProvider::ArConnect
    }

    async fn connect(&self) -> Result<(), SubmissionFailure> {
        let permissions: Vec<&str> = self.permissions.iter().map(Permission::as_str).collect();
        self.bridge
            .call(
                "connect",
                json!({ "permissions": permissions, "appInfo": { "name": self.app_name } }),
            )
            .await
            .map_err(submission_error)?;

        self.connected.store(true, Ordering::Release);
        info!(provider = self.provider().name(), "wallet connected");
        Ok(())
    }

    async fn active_address(&self) -> Result<Address, SubmissionFailure> {
        if !self.is_connected() {
            return Err(SubmissionFailure::NotConnected);
        }

        let reply = self
            .bridge
            .call("getActiveAddress", json!({}))
            .await
            .map_err(submission_error)?;

        reply
            .as_str()
            .map(Address::new)
            .ok_or_else(|| SubmissionFailure::MalformedReply(format!("address expected, got {reply}")))
    }

    async fn dispatch(&self, draft: &PostDraft) -> Result<TxId, SubmissionFailure> {
        draft.validate()?;
        if !self.is_connected() {
            return Err(SubmissionFailure::NotConnected);
        }

        let reply = self
            .bridge
            .call("dispatch", json!({ "data": draft.body, "tags": tags_param(draft) }))
            .await
            .map_err(submission_error)?;

        let id = TxId::new(string_field(&reply, "id")?);
        info!(%id, provider = self.provider().name(), "post dispatched");
        Ok(id)
    }
}

/// arweave.app adapter
pub struct ArweaveAppSigner {
    bridge: Arc<dyn WalletBridge>,
    app_name: String,
    address: Mutex<Option<Address>>,
}

impl ArweaveAppSigner {
    /// Create adapter
    #[must_use]
    pub fn new(bridge: Arc<dyn WalletBridge>, app_name: impl Into<String>) -> Self {
        Self {
            bridge,
            app_name: app_name.into(),
            address: Mutex::new(None),
        }
    }

    fn connected_address(&self) -> Option<Address> {
        self.address.lock().clone()
    }
}

#[async_trait]
impl Signer for ArweaveAppSigner {
    fn provider(&self) -> WalletProvider {
        WalletProvider::ArweaveApp
    }

    async fn connect(&self) -> Result<(), SubmissionFailure> {
        let reply = self
            .bridge
            .call("connect", json!({ "appInfo": { "name": self.app_name } }))
            .await
            .map_err(submission_error)?;

        let address = reply
            .as_str()
            .map(Address::new)
            .ok_or_else(|| SubmissionFailure::MalformedReply(format!("address expected, got {reply}")))?;

        info!(%address, provider = self.provider().name(), "wallet connected");
        *self.address.lock() = Some(address);
        Ok(())
    }

    async fn active_address(&self) -> Result<Address, SubmissionFailure> {
        self.connected_address().ok_or(SubmissionFailure::NotConnected)
    }

    async fn dispatch(&self, draft: &PostDraft) -> Result<TxId, SubmissionFailure> {
        draft.validate()?;
        if self.connected_address().is_none() {
            return Err(SubmissionFailure::NotConnected);
        }

        let reply = self
            .bridge
            .call(
                "dispatch",
                json!({ "transaction": { "data": draft.body, "tags": tags_param(draft) } }),
            )
            .await
            .map_err(submission_error)?;

        let id = TxId::new(string_field(&reply, "id")?);
        info!(%id, provider = self.provider().name(), "post dispatched");
        Ok(id)
    }
}

/// Build the adapter for `provider` and connect it
pub async fn connect_signer(
    provider: WalletProvider,
    bridge: Arc<dyn WalletBridge>,
    app_name: &str,
) -> Result<Box<dyn Signer>, SubmissionFailure> {
    let signer: Box<dyn Signer> = match provider {
        WalletProvider::ArConnect => Box::new(ArConnectSigner::new(bridge, app_name)),
        WalletProvider::ArweaveApp => Box::new(ArweaveAppSigner::new(bridge, app_name)),
    };
    signer.connect().await?;
    Ok(signer)
}

//! Square Wallet - signing providers for Public Square submissions
//!
//! The feed engine never signs anything itself. It hands a [`PostDraft`] to a
//! [`Signer`] and receives the transaction id the wallet assigned at
//! acceptance time. Two wallet providers are supported, each behind the same
//! trait:
//!
//! - [`ArConnectSigner`] - permission-based browser extension
//! - [`ArweaveAppSigner`] - web wallet that connects without a permission list
//!
//! Both talk to the wallet through a [`WalletBridge`], by default a JSON-RPC
//! endpoint exposed by a local wallet daemon ([`JsonRpcBridge`]).

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bridge;
pub mod draft;
pub mod error;
pub mod signer;

pub use bridge::{JsonRpcBridge, WalletBridge, DEFAULT_BRIDGE_URL};
pub use draft::{PostDraft, PROTOCOL_VERSION, TYPE_TAG, VERSION_TAG};
pub use error::{BridgeError, SubmissionFailure};
pub use signer::{connect_signer, ArConnectSigner, ArweaveAppSigner, Permission, Signer, WalletProvider};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

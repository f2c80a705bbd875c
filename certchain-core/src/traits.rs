//! Common traits for CertChain.
//!
//! These are the seams between the certificate service and the outside
//! world: a wallet (EIP-1193 provider) and a pinning service. Both have an
//! HTTP implementation and an in-process one for tests and local use.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{Address, NetworkConfig, TransactionReceipt, TransactionRequest, TxHash};

// ═══════════════════════════════════════════════════════════════════════════════
// WALLET PROVIDER
// ═══════════════════════════════════════════════════════════════════════════════

/// An EIP-1193 style wallet provider.
///
/// Errors are already mapped to typed variants (`UserRejected`,
/// `UnrecognizedChain`, reverts) so callers can branch on them.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Asks the wallet for accounts (`eth_requestAccounts`).
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// Active chain id (`eth_chainId`).
    async fn chain_id(&self) -> Result<u64>;

    /// Switches the active chain (`wallet_switchEthereumChain`).
    async fn switch_chain(&self, chain_id: u64) -> Result<()>;

    /// Registers a chain with the wallet (`wallet_addEthereumChain`).
    async fn add_chain(&self, network: &NetworkConfig) -> Result<()>;

    /// Signs and submits a transaction.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash>;

    /// Executes a read-only call and returns the raw output.
    async fn call(&self, tx: TransactionRequest) -> Result<Vec<u8>>;

    /// Receipt of a mined transaction, `None` while pending.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PINNING SERVICE
// ═══════════════════════════════════════════════════════════════════════════════

/// A service that persists content on IPFS.
#[async_trait]
pub trait PinningService: Send + Sync {
    /// Pins raw bytes and returns the CID.
    async fn pin_file(&self, data: Vec<u8>, name: &str) -> Result<String>;

    /// Pins a JSON document and returns the CID.
    async fn pin_json(&self, value: &Value, name: &str) -> Result<String>;

    /// Fetches content by CID.
    async fn fetch(&self, cid: &str) -> Result<Vec<u8>>;

    /// Removes a pin.
    async fn unpin(&self, cid: &str) -> Result<()>;
}

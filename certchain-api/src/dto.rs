//! DTOs for API requests and responses.

use serde::{Deserialize, Serialize};

use certchain_core::types::{
    Address, Certificate, CertificateId, CertificateMetadata, ContractEvent, LogEntry,
    TransactionReceipt, TxHash,
};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Chain id served
    pub chain_id: u64,
    /// Latest block
    pub block_number: u64,
    /// Certificates issued
    pub certificate_count: u64,
    /// Whether metadata pinning is available
    pub ipfs_enabled: bool,
}

/// Registry overview.
#[derive(Debug, Serialize, Deserialize)]
pub struct ContractInfoResponse {
    /// Registry address
    pub address: Address,
    /// Registry owner
    pub owner: Address,
    /// Gas threshold
    pub gas_limit: u64,
    /// Certificates issued
    pub certificate_count: u64,
    /// Chain id
    pub chain_id: u64,
    /// Latest block
    pub block_number: u64,
}

/// Options shared by every transaction request.
#[derive(Debug, Default, Deserialize)]
pub struct TxOptions {
    /// Sender; defaults to the registry owner
    #[serde(default)]
    pub from: Option<Address>,
    /// Gas supplied; defaults to the node default
    #[serde(default)]
    pub gas: Option<u64>,
}

/// Request to issue a certificate.
#[derive(Debug, Deserialize)]
pub struct IssueCertificateRequest {
    /// Credential holder
    pub recipient_name: String,
    /// Optional `ipfs://` metadata link
    #[serde(default)]
    pub metadata_uri: Option<String>,
    /// Transaction options
    #[serde(flatten)]
    pub tx: TxOptions,
}

/// Request to move a certificate to a new recipient.
#[derive(Debug, Deserialize)]
pub struct TransferCertificateRequest {
    /// New recipient name
    pub new_recipient_name: String,
    /// Transaction options
    #[serde(flatten)]
    pub tx: TxOptions,
}

/// Request to change the gas threshold.
#[derive(Debug, Deserialize)]
pub struct SetGasLimitRequest {
    /// New threshold
    pub gas_limit: u64,
    /// Transaction options
    #[serde(flatten)]
    pub tx: TxOptions,
}

/// Body of state-changing requests that need nothing else.
#[derive(Debug, Default, Deserialize)]
pub struct TxOnlyRequest {
    /// Transaction options
    #[serde(flatten)]
    pub tx: TxOptions,
}

/// A mined transaction.
#[derive(Debug, Serialize, Deserialize)]
pub struct TxResponse {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block it was mined in
    pub block_number: u64,
    /// Gas consumed
    pub gas_used: u64,
    /// Registry events emitted
    pub events: Vec<ContractEvent>,
}

impl TxResponse {
    /// Builds the response from a receipt and its decoded events.
    pub fn new(receipt: &TransactionReceipt, events: Vec<ContractEvent>) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            events,
        }
    }
}

/// Response to an issue request.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueCertificateResponse {
    /// New certificate id
    pub id: CertificateId,
    /// The transaction
    #[serde(flatten)]
    pub tx: TxResponse,
}

/// A certificate.
#[derive(Debug, Serialize, Deserialize)]
pub struct CertificateResponse {
    /// Id
    pub id: CertificateId,
    /// Credential holder
    pub recipient_name: String,
    /// Unix issue timestamp
    pub issue_date: u64,
    /// Issue date as RFC 3339
    pub issued_at: Option<String>,
    /// False once revoked
    pub is_valid: bool,
    /// Metadata link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_uri: Option<String>,
}

impl From<Certificate> for CertificateResponse {
    fn from(cert: Certificate) -> Self {
        let issued_at = cert.issued_at().map(|dt| dt.to_rfc3339());
        Self {
            id: cert.id,
            recipient_name: cert.recipient_name,
            issue_date: cert.issue_date,
            issued_at,
            is_valid: cert.is_valid,
            metadata_uri: cert.metadata_uri,
        }
    }
}

/// Validity of a certificate.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Id
    pub id: CertificateId,
    /// Validity
    pub is_valid: bool,
}

/// Query of the events endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// First block to include
    #[serde(default)]
    pub from_block: u64,
}

/// Registry events.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    /// Events in mining order
    pub events: Vec<LogEntry>,
    /// Latest block
    pub latest_block: u64,
}

/// Request to pin certificate metadata.
pub type PinMetadataRequest = CertificateMetadata;

/// Pinned metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct PinMetadataResponse {
    /// Content identifier
    pub cid: String,
    /// `ipfs://` URI to store on-chain
    pub uri: String,
}

//! Error types for CertChain.
//!
//! A single error hierarchy built with `thiserror`. Contract reverts carry
//! enough structure to be re-created from a revert reason string, which lets
//! a client that only sees JSON-RPC errors recover the typed variant.

use thiserror::Error;

use crate::constants::{
    RPC_CHAIN_DISCONNECTED, RPC_EXECUTION_REVERTED, RPC_REQUEST_PENDING, RPC_UNAUTHORIZED,
    RPC_UNRECOGNIZED_CHAIN, RPC_USER_REJECTED,
};

/// Result type alias using `CertchainError`.
pub type Result<T> = std::result::Result<T, CertchainError>;

/// Main error type for all CertChain operations.
#[derive(Debug, Error)]
pub enum CertchainError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CONTRACT REVERTS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Caller is not the registry owner.
    #[error("Caller is not the registry owner")]
    Unauthorized,

    /// Remaining gas is below the owner-configured threshold.
    #[error("Insufficient gas: {remaining} remaining, {required} required")]
    InsufficientGas {
        /// Gas left when the guard ran
        remaining: u64,
        /// Configured threshold
        required: u64,
    },

    /// Execution ran out of gas.
    #[error("Out of gas")]
    OutOfGas,

    /// Transaction does not cover its intrinsic cost.
    #[error("Intrinsic gas too low: have {supplied}, want {required}")]
    IntrinsicGasTooLow {
        /// Gas supplied with the transaction
        supplied: u64,
        /// Intrinsic cost of the transaction
        required: u64,
    },

    /// No certificate with this id.
    #[error("Certificate not found: {0}")]
    CertificateNotFound(u64),

    /// Certificate was already revoked.
    #[error("Certificate already revoked: {0}")]
    CertificateAlreadyRevoked(u64),

    /// Certificate is revoked and cannot be modified.
    #[error("Certificate is not valid: {0}")]
    CertificateNotValid(u64),

    /// Recipient name rejected by the registry.
    #[error("Invalid recipient name: {0}")]
    InvalidRecipientName(String),

    /// Metadata URI rejected by the registry.
    #[error("Invalid metadata URI: {0}")]
    InvalidMetadataUri(String),

    /// Gas limit outside the accepted range.
    #[error("Invalid gas limit: {0}")]
    InvalidGasLimit(u64),

    /// Ownership cannot move to the zero address.
    #[error("New owner is the zero address")]
    InvalidOwner,

    /// Any other revert, carrying the raw reason.
    #[error("Execution reverted: {0}")]
    Reverted(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // ABI ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Malformed ABI payload.
    #[error("ABI decode error: {0}")]
    AbiDecode(String),

    /// Calldata selector does not match any registry function.
    #[error("Unknown function selector: 0x{0}")]
    UnknownSelector(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // WALLET PROVIDER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// The user rejected the request in their wallet (EIP-1193 4001).
    #[error("User rejected the request")]
    UserRejected,

    /// The account has not authorized this dApp (EIP-1193 4100).
    #[error("Account not authorized")]
    AccountNotAuthorized,

    /// The provider is not connected to the chain (EIP-1193 4901).
    #[error("Chain disconnected: {0}")]
    ChainDisconnected(String),

    /// The wallet does not know the requested chain (EIP-1193 4902).
    #[error("Unrecognized chain: {0}")]
    UnrecognizedChain(String),

    /// A wallet request is already pending (-32002).
    #[error("A wallet request is already pending")]
    RequestPending,

    /// No account is connected.
    #[error("Wallet not connected")]
    WalletNotConnected,

    /// The wallet is on a different chain than required.
    #[error("Wrong network: expected chain {expected}, got {actual}")]
    WrongNetwork {
        /// Required chain id
        expected: u64,
        /// Active chain id
        actual: u64,
    },

    /// Sender cannot pay for the transaction.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Any other provider error.
    #[error("Provider error {code}: {message}")]
    Provider {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the provider
        message: String,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSACTION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Node rejected the transaction before execution.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Transaction was mined with a failure status.
    #[error("Transaction failed: {tx_hash}")]
    TransactionFailed {
        /// Hash of the failed transaction
        tx_hash: String,
    },

    /// No receipt became available for the transaction.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // IPFS ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// IPFS upload failed.
    #[error("IPFS upload failed: {0}")]
    IpfsUploadFailed(String),

    /// IPFS download failed.
    #[error("IPFS download failed for CID '{cid}': {reason}")]
    IpfsDownloadFailed {
        /// CID being fetched
        cid: String,
        /// Failure reason
        reason: String,
    },

    /// Invalid IPFS CID format.
    #[error("Invalid IPFS CID: {0}")]
    InvalidIpfsCid(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    HexError(#[from] hex::FromHexError),

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Connection timeout.
    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    /// Malformed JSON-RPC exchange.
    #[error("RPC call failed: {0}")]
    RpcError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Snapshot file is corrupted.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Snapshot format version mismatch.
    #[error("Format version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Supported version
        expected: u8,
        /// Version found in the file
        actual: u8,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Malformed account address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

const REASON_NOT_OWNER: &str = "caller is not the owner";
const REASON_INSUFFICIENT_GAS: &str = "insufficient gas";
const REASON_NOT_FOUND: &str = "certificate does not exist";
const REASON_ALREADY_REVOKED: &str = "certificate already revoked";
const REASON_NOT_VALID: &str = "certificate is not valid";
const REASON_INVALID_NAME: &str = "invalid recipient name";
const REASON_INVALID_URI: &str = "invalid metadata uri";
const REASON_INVALID_GAS_LIMIT: &str = "invalid gas limit";
const REASON_ZERO_OWNER: &str = "new owner is the zero address";

impl CertchainError {
    /// Returns true if this error is recoverable (can retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CertchainError::HttpError(_)
                | CertchainError::ConnectionTimeout(_)
                | CertchainError::RequestPending
                | CertchainError::TransactionNotFound(_)
        )
    }

    /// Returns true if this error is a contract revert.
    pub fn is_revert(&self) -> bool {
        self.revert_reason().is_some()
    }

    /// Returns true if the wallet or its user refused the request.
    pub fn is_wallet_error(&self) -> bool {
        matches!(
            self,
            CertchainError::UserRejected
                | CertchainError::AccountNotAuthorized
                | CertchainError::ChainDisconnected(_)
                | CertchainError::UnrecognizedChain(_)
                | CertchainError::RequestPending
                | CertchainError::WalletNotConnected
                | CertchainError::WrongNetwork { .. }
        )
    }

    /// Returns the revert reason string the registry contract produces for
    /// this error, or `None` if the error is not a revert.
    pub fn revert_reason(&self) -> Option<String> {
        let reason = match self {
            CertchainError::Unauthorized => REASON_NOT_OWNER.to_string(),
            CertchainError::InsufficientGas { remaining, required } => format!(
                "{}: remaining {}, required {}",
                REASON_INSUFFICIENT_GAS, remaining, required
            ),
            CertchainError::CertificateNotFound(id) => format!("{}: {}", REASON_NOT_FOUND, id),
            CertchainError::CertificateAlreadyRevoked(id) => {
                format!("{}: {}", REASON_ALREADY_REVOKED, id)
            }
            CertchainError::CertificateNotValid(id) => format!("{}: {}", REASON_NOT_VALID, id),
            CertchainError::InvalidRecipientName(why) => format!("{}: {}", REASON_INVALID_NAME, why),
            CertchainError::InvalidMetadataUri(why) => format!("{}: {}", REASON_INVALID_URI, why),
            CertchainError::InvalidGasLimit(limit) => {
                format!("{}: {}", REASON_INVALID_GAS_LIMIT, limit)
            }
            CertchainError::InvalidOwner => REASON_ZERO_OWNER.to_string(),
            CertchainError::Reverted(reason) => reason.clone(),
            _ => return None,
        };
        Some(reason)
    }

    /// Rebuilds a typed error from a revert reason string.
    ///
    /// Reasons that do not originate from the registry become
    /// [`CertchainError::Reverted`].
    pub fn from_revert_reason(reason: &str) -> Self {
        let reason = reason.trim();
        let (head, tail) = match reason.split_once(": ") {
            Some((head, tail)) => (head, Some(tail)),
            None => (reason, None),
        };
        let id = || tail.and_then(|t| t.trim().parse::<u64>().ok());

        match head {
            REASON_NOT_OWNER => CertchainError::Unauthorized,
            REASON_ZERO_OWNER => CertchainError::InvalidOwner,
            REASON_INSUFFICIENT_GAS => {
                let mut remaining = 0;
                let mut required = 0;
                for part in tail.unwrap_or_default().split(", ") {
                    if let Some(v) = part.strip_prefix("remaining ") {
                        remaining = v.parse().unwrap_or(0);
                    } else if let Some(v) = part.strip_prefix("required ") {
                        required = v.parse().unwrap_or(0);
                    }
                }
                CertchainError::InsufficientGas { remaining, required }
            }
            REASON_NOT_FOUND => match id() {
                Some(id) => CertchainError::CertificateNotFound(id),
                None => CertchainError::Reverted(reason.to_string()),
            },
            REASON_ALREADY_REVOKED => match id() {
                Some(id) => CertchainError::CertificateAlreadyRevoked(id),
                None => CertchainError::Reverted(reason.to_string()),
            },
            REASON_NOT_VALID => match id() {
                Some(id) => CertchainError::CertificateNotValid(id),
                None => CertchainError::Reverted(reason.to_string()),
            },
            REASON_INVALID_GAS_LIMIT => match id() {
                Some(limit) => CertchainError::InvalidGasLimit(limit),
                None => CertchainError::Reverted(reason.to_string()),
            },
            REASON_INVALID_NAME => {
                CertchainError::InvalidRecipientName(tail.unwrap_or_default().to_string())
            }
            REASON_INVALID_URI => {
                CertchainError::InvalidMetadataUri(tail.unwrap_or_default().to_string())
            }
            _ => CertchainError::Reverted(reason.to_string()),
        }
    }

    /// Maps a JSON-RPC / EIP-1193 error object to a typed error.
    ///
    /// `data` is the optional hex payload attached to the error; for reverts
    /// it carries the ABI-encoded `Error(string)`.
    pub fn from_rpc_error(code: i64, message: &str, data: Option<&str>) -> Self {
        match code {
            RPC_USER_REJECTED => return CertchainError::UserRejected,
            RPC_UNAUTHORIZED => return CertchainError::AccountNotAuthorized,
            RPC_CHAIN_DISCONNECTED => return CertchainError::ChainDisconnected(message.to_string()),
            RPC_UNRECOGNIZED_CHAIN => return CertchainError::UnrecognizedChain(message.to_string()),
            RPC_REQUEST_PENDING => return CertchainError::RequestPending,
            _ => {}
        }

        if let Some(reason) = data
            .and_then(|d| hex::decode(d.trim_start_matches("0x")).ok())
            .and_then(|bytes| crate::abi::decode_revert(&bytes))
        {
            return Self::from_revert_reason(&reason);
        }

        let lower = message.to_lowercase();
        if lower.contains("insufficient funds") {
            return CertchainError::InsufficientFunds(message.to_string());
        }
        if lower.contains("intrinsic gas too low") {
            let number_after = |key: &str| {
                lower
                    .split(key)
                    .nth(1)
                    .and_then(|rest| {
                        rest.trim()
                            .split(|c: char| !c.is_ascii_digit())
                            .next()
                            .and_then(|n| n.parse::<u64>().ok())
                    })
                    .unwrap_or(0)
            };
            return CertchainError::IntrinsicGasTooLow {
                supplied: number_after("have"),
                required: number_after("want"),
            };
        }
        if lower.contains("out of gas") {
            return CertchainError::OutOfGas;
        }
        if let Some(reason) = extract_revert_reason(message) {
            return Self::from_revert_reason(&reason);
        }
        if code == RPC_EXECUTION_REVERTED {
            return CertchainError::Reverted(String::new());
        }

        CertchainError::Provider {
            code,
            message: message.to_string(),
        }
    }
}

/// Pulls the reason out of node messages such as
/// `execution reverted: reason` or
/// `VM Exception while processing transaction: reverted with reason string 'reason'`.
fn extract_revert_reason(message: &str) -> Option<String> {
    if let Some(idx) = message.find("reverted with reason string '") {
        let rest = &message[idx + "reverted with reason string '".len()..];
        return rest.rfind('\'').map(|end| rest[..end].to_string());
    }
    if let Some(idx) = message.find("execution reverted") {
        let rest = message[idx + "execution reverted".len()..].trim_start();
        return Some(rest.strip_prefix(':').unwrap_or(rest).trim().to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = CertchainError::InsufficientGas {
            remaining: 1200,
            required: 50_000,
        };
        assert!(err.to_string().contains("1200"));
        assert!(err.to_string().contains("50000"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CertchainError::HttpError("test".into()).is_recoverable());
        assert!(CertchainError::RequestPending.is_recoverable());
        assert!(!CertchainError::UserRejected.is_recoverable());

        assert!(CertchainError::Unauthorized.is_revert());
        assert!(CertchainError::Reverted("x".into()).is_revert());
        assert!(!CertchainError::OutOfGas.is_revert());

        assert!(CertchainError::UserRejected.is_wallet_error());
        assert!(!CertchainError::Unauthorized.is_wallet_error());
    }

    #[test_case(CertchainError::Unauthorized ; "unauthorized")]
    #[test_case(CertchainError::InsufficientGas { remaining: 10, required: 20 } ; "insufficient gas")]
    #[test_case(CertchainError::CertificateNotFound(42) ; "not found")]
    #[test_case(CertchainError::CertificateAlreadyRevoked(3) ; "already revoked")]
    #[test_case(CertchainError::CertificateNotValid(9) ; "not valid")]
    #[test_case(CertchainError::InvalidRecipientName("empty".into()) ; "invalid name")]
    #[test_case(CertchainError::InvalidGasLimit(0) ; "invalid gas limit")]
    #[test_case(CertchainError::InvalidOwner ; "zero owner")]
    fn test_revert_reason_recovers_variant(err: CertchainError) {
        let reason = err.revert_reason().unwrap();
        let rebuilt = CertchainError::from_revert_reason(&reason);
        assert_eq!(rebuilt.to_string(), err.to_string());
    }

    #[test]
    fn test_unknown_revert_reason_is_generic() {
        let err = CertchainError::from_revert_reason("Pausable: paused");
        assert!(matches!(err, CertchainError::Reverted(ref r) if r == "Pausable: paused"));
    }

    #[test_case(4001, "User denied transaction signature" => "User rejected the request" ; "rejected")]
    #[test_case(-32002, "Request already pending" => "A wallet request is already pending" ; "pending")]
    #[test_case(4100, "not authorized" => "Account not authorized" ; "unauthorized account")]
    fn test_rpc_code_mapping(code: i64, message: &str) -> String {
        CertchainError::from_rpc_error(code, message, None).to_string()
    }

    #[test]
    fn test_rpc_unrecognized_chain() {
        let err = CertchainError::from_rpc_error(4902, "Unrecognized chain ID 0xaa36a7", None);
        assert!(matches!(err, CertchainError::UnrecognizedChain(_)));
    }

    #[test]
    fn test_rpc_revert_from_data() {
        let data = format!(
            "0x{}",
            hex::encode(crate::abi::encode_revert("certificate does not exist: 5"))
        );
        let err = CertchainError::from_rpc_error(3, "execution reverted", Some(&data));
        assert!(matches!(err, CertchainError::CertificateNotFound(5)));
    }

    #[test]
    fn test_rpc_revert_from_message() {
        let err = CertchainError::from_rpc_error(
            -32603,
            "VM Exception while processing transaction: reverted with reason string 'caller is not the owner'",
            None,
        );
        assert!(matches!(err, CertchainError::Unauthorized));

        let err = CertchainError::from_rpc_error(3, "execution reverted: certificate already revoked: 2", None);
        assert!(matches!(err, CertchainError::CertificateAlreadyRevoked(2)));
    }

    #[test]
    fn test_rpc_gas_errors() {
        let err = CertchainError::from_rpc_error(-32000, "intrinsic gas too low: have 100, want 21000", None);
        assert!(matches!(
            err,
            CertchainError::IntrinsicGasTooLow { supplied: 100, required: 21000 }
        ));

        let err = CertchainError::from_rpc_error(-32000, "out of gas", None);
        assert!(matches!(err, CertchainError::OutOfGas));

        let err = CertchainError::from_rpc_error(-32000, "insufficient funds for gas * price + value", None);
        assert!(matches!(err, CertchainError::InsufficientFunds(_)));
    }

    #[test]
    fn test_rpc_unknown_error_kept() {
        let err = CertchainError::from_rpc_error(-32601, "the method foo does not exist", None);
        assert!(matches!(err, CertchainError::Provider { code: -32601, .. }));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let result: Result<serde_json::Value> = json_result.map_err(CertchainError::from);
        assert!(matches!(result, Err(CertchainError::JsonError(_))));
    }
}

//! User-facing error translation.
//!
//! Wallet providers, nodes and the registry each report failures in their
//! own vocabulary. [`ServiceError`] pairs the typed cause with a message
//! that can be shown to the person holding the wallet.

use thiserror::Error;

use certchain_core::constants::BLOCK_GAS_LIMIT;
use certchain_core::error::CertchainError;

/// Result type of [`CertificateService`](crate::CertificateService) operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// A failed service operation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    /// What to tell the user
    pub message: String,
    /// What actually happened
    #[source]
    pub source: CertchainError,
}

impl ServiceError {
    /// The typed cause.
    pub fn kind(&self) -> &CertchainError {
        &self.source
    }
}

impl From<CertchainError> for ServiceError {
    fn from(source: CertchainError) -> Self {
        Self {
            message: user_message(&source),
            source,
        }
    }
}

/// Translates an error into a message for the user.
pub fn user_message(err: &CertchainError) -> String {
    match err {
        CertchainError::UserRejected => "Transaction was rejected in your wallet.".into(),
        CertchainError::RequestPending => {
            "A request is already pending in your wallet. Open your wallet to continue.".into()
        }
        CertchainError::UnrecognizedChain(_) => {
            "This network is not configured in your wallet. Add it and try again.".into()
        }
        CertchainError::WrongNetwork { expected, .. } => {
            format!("Please switch your wallet to chain {}.", expected)
        }
        CertchainError::ChainDisconnected(_) => {
            "Your wallet is connected to a different network. Switch networks and try again."
                .into()
        }
        CertchainError::WalletNotConnected | CertchainError::AccountNotAuthorized => {
            "Please connect your wallet first.".into()
        }
        CertchainError::InsufficientFunds(_) => {
            "Your account does not have enough funds to pay for gas.".into()
        }
        CertchainError::Unauthorized => {
            "Only the contract owner can perform this action.".into()
        }
        CertchainError::InsufficientGas { required, .. } => format!(
            "Not enough gas: the contract requires at least {} gas remaining. Increase the gas limit and try again.",
            required
        ),
        CertchainError::OutOfGas | CertchainError::IntrinsicGasTooLow { .. } => {
            "The transaction ran out of gas. Increase the gas limit and try again.".into()
        }
        CertchainError::CertificateNotFound(id) => format!("Certificate #{} does not exist.", id),
        CertchainError::CertificateAlreadyRevoked(id) => {
            format!("Certificate #{} has already been revoked.", id)
        }
        CertchainError::CertificateNotValid(id) => format!(
            "Certificate #{} has been revoked and can no longer be changed.",
            id
        ),
        CertchainError::InvalidRecipientName(_) => "Please enter a valid recipient name.".into(),
        CertchainError::InvalidMetadataUri(_) => "The metadata link is not valid.".into(),
        CertchainError::InvalidGasLimit(_) => format!(
            "The gas limit must be between 1 and {}.",
            BLOCK_GAS_LIMIT
        ),
        CertchainError::InvalidOwner => "The new owner address is not valid.".into(),
        CertchainError::Reverted(reason) if reason.is_empty() => {
            "The transaction was reverted by the contract.".into()
        }
        CertchainError::Reverted(reason) => {
            format!("The transaction was reverted: {}", reason)
        }
        CertchainError::TransactionFailed { .. } => "The transaction failed on-chain.".into(),
        CertchainError::TransactionNotFound(_) => {
            "The transaction was not confirmed in time. Check your wallet for its status.".into()
        }
        CertchainError::HttpError(_)
        | CertchainError::ConnectionTimeout(_)
        | CertchainError::RpcError(_) => {
            "Could not reach the network. Check your connection and RPC endpoint.".into()
        }
        CertchainError::IpfsUploadFailed(_) => "Uploading to IPFS failed. Try again later.".into(),
        CertchainError::IpfsDownloadFailed { .. } | CertchainError::InvalidIpfsCid(_) => {
            "The certificate metadata could not be retrieved from IPFS.".into()
        }
        CertchainError::ConfigError(msg) => format!("Configuration problem: {}", msg),
        other => format!("Something went wrong: {}", other),
    }
}

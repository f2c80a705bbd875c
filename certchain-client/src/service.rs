//! The certificate service used by front ends.
//!
//! Wraps a wallet provider and the registry binding. Before any operation
//! the service makes sure an account is connected and the wallet sits on
//! the configured network, switching (and if needed adding) the network
//! the way a dApp does through EIP-1193. Failures come back as
//! [`ServiceError`]s carrying a user-facing message.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use certchain_core::calls::RegistryCall;
use certchain_core::error::{CertchainError, Result};
use certchain_core::traits::{PinningService, WalletProvider};
use certchain_core::types::{
    validate_metadata_uri, validate_recipient_name, Address, Certificate, CertificateId,
    CertificateMetadata, ContractEvent, NetworkConfig,
};

use crate::contract::{RegistryContract, TxOutcome};
use crate::errors::{ServiceError, ServiceResult};

/// Registry state shown on a dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    /// Registry address
    pub address: Address,
    /// Registry owner
    pub owner: Address,
    /// Gas threshold
    pub gas_limit: u64,
    /// Certificates issued so far
    pub certificate_count: u64,
    /// Chain the registry lives on
    pub chain_id: u64,
}

/// Client-side certificate service.
#[derive(Debug)]
pub struct CertificateService<P> {
    contract: RegistryContract<P>,
    network: NetworkConfig,
    account: RwLock<Option<Address>>,
}

impl<P: WalletProvider> CertificateService<P> {
    /// Creates a service for the registry bound in `contract` on `network`.
    pub fn new(contract: RegistryContract<P>, network: NetworkConfig) -> Self {
        Self {
            contract,
            network,
            account: RwLock::new(None),
        }
    }

    /// The registry binding.
    pub fn contract(&self) -> &RegistryContract<P> {
        &self.contract
    }

    /// Required network.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Connected account, if any.
    pub fn account(&self) -> Option<Address> {
        *self.account.read()
    }

    /// Forgets the connected account.
    pub fn disconnect(&self) {
        *self.account.write() = None;
    }

    fn provider(&self) -> &P {
        self.contract.provider()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONNECTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Requests accounts, moves the wallet to the required network and
    /// remembers the first account.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> ServiceResult<Address> {
        let account = self.try_connect().await?;
        info!(%account, chain_id = self.network.chain_id, "Wallet connected");
        Ok(account)
    }

    async fn try_connect(&self) -> Result<Address> {
        let account = self
            .provider()
            .request_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(CertchainError::WalletNotConnected)?;
        self.switch_network().await?;
        *self.account.write() = Some(account);
        Ok(account)
    }

    /// Makes sure the wallet is on the required network.
    pub async fn ensure_network(&self) -> ServiceResult<()> {
        Ok(self.switch_network().await?)
    }

    async fn switch_network(&self) -> Result<()> {
        let expected = self.network.chain_id;
        let current = self.provider().chain_id().await?;
        if current == expected {
            return Ok(());
        }

        debug!(current, expected, "Switching network");
        match self.provider().switch_chain(expected).await {
            Ok(()) => {}
            Err(CertchainError::UnrecognizedChain(_)) => {
                debug!(expected, "Network unknown to wallet, adding it");
                self.provider().add_chain(&self.network).await?;
                self.provider().switch_chain(expected).await?;
            }
            Err(err) => return Err(err),
        }

        let actual = self.provider().chain_id().await?;
        if actual != expected {
            warn!(actual, expected, "Wallet still on the wrong network");
            return Err(CertchainError::WrongNetwork { expected, actual });
        }
        Ok(())
    }

    async fn ready(&self) -> Result<Address> {
        let account = self.account().ok_or(CertchainError::WalletNotConnected)?;
        self.switch_network().await?;
        Ok(account)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSACTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Issues a certificate and returns its id.
    #[instrument(skip(self))]
    pub async fn issue_certificate(
        &self,
        recipient_name: &str,
        metadata_uri: Option<&str>,
    ) -> ServiceResult<(CertificateId, TxOutcome)> {
        Ok(self.try_issue(recipient_name, metadata_uri).await?)
    }

    async fn try_issue(
        &self,
        recipient_name: &str,
        metadata_uri: Option<&str>,
    ) -> Result<(CertificateId, TxOutcome)> {
        validate_recipient_name(recipient_name)?;
        if let Some(uri) = metadata_uri {
            validate_metadata_uri(uri)?;
        }
        let account = self.ready().await?;

        let call = match metadata_uri {
            Some(uri) => RegistryCall::IssueCertificateWithMetadata {
                recipient_name: recipient_name.to_string(),
                metadata_uri: uri.to_string(),
            },
            None => RegistryCall::IssueCertificate {
                recipient_name: recipient_name.to_string(),
            },
        };
        let outcome = self.contract.send(account, &call).await?;
        let id = outcome.certificate_id().ok_or_else(|| {
            CertchainError::InternalError("issue emitted no CertificateIssued event".into())
        })?;

        info!(id, tx = %outcome.tx_hash(), "Certificate issued");
        Ok((id, outcome))
    }

    /// Pins `metadata` to `pinning` and issues a certificate linked to it.
    #[instrument(skip_all, fields(recipient = %metadata.recipient))]
    pub async fn issue_with_metadata<S>(
        &self,
        pinning: &S,
        metadata: &CertificateMetadata,
    ) -> ServiceResult<(CertificateId, TxOutcome)>
    where
        S: PinningService + ?Sized,
    {
        self.ready().await?;
        let uri = certchain_ipfs::pin_metadata(pinning, metadata).await?;
        debug!(%uri, "Metadata pinned");
        self.issue_certificate(&metadata.recipient, Some(&uri)).await
    }

    /// Verifies a certificate on-chain, emitting `CertificateVerified`.
    #[instrument(skip(self))]
    pub async fn record_verification(&self, id: CertificateId) -> ServiceResult<(bool, TxOutcome)> {
        Ok(self.try_record_verification(id).await?)
    }

    async fn try_record_verification(&self, id: CertificateId) -> Result<(bool, TxOutcome)> {
        let account = self.ready().await?;
        let outcome = self
            .contract
            .send(account, &RegistryCall::VerifyCertificate { id })
            .await?;
        let is_valid = outcome
            .events
            .iter()
            .find_map(|event| match event {
                ContractEvent::CertificateVerified { is_valid, .. } => Some(*is_valid),
                _ => None,
            })
            .ok_or_else(|| {
                CertchainError::InternalError("verify emitted no CertificateVerified event".into())
            })?;
        Ok((is_valid, outcome))
    }

    /// Revokes a certificate.
    #[instrument(skip(self))]
    pub async fn revoke_certificate(&self, id: CertificateId) -> ServiceResult<TxOutcome> {
        let outcome = self.send(RegistryCall::RevokeCertificate { id }).await?;
        info!(id, "Certificate revoked");
        Ok(outcome)
    }

    /// Moves a certificate to a new recipient name.
    #[instrument(skip(self))]
    pub async fn transfer_certificate(
        &self,
        id: CertificateId,
        new_recipient_name: &str,
    ) -> ServiceResult<TxOutcome> {
        validate_recipient_name(new_recipient_name).map_err(ServiceError::from)?;
        Ok(self
            .send(RegistryCall::TransferCertificate {
                id,
                new_recipient_name: new_recipient_name.to_string(),
            })
            .await?)
    }

    /// Changes the gas threshold.
    #[instrument(skip(self))]
    pub async fn set_gas_limit(&self, limit: u64) -> ServiceResult<TxOutcome> {
        Ok(self.send(RegistryCall::SetGasLimit { limit }).await?)
    }

    async fn send(&self, call: RegistryCall) -> Result<TxOutcome> {
        let account = self.ready().await?;
        self.contract.send(account, &call).await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // READS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Validity of a certificate, read without a transaction.
    pub async fn verify_certificate(&self, id: CertificateId) -> ServiceResult<bool> {
        let account = self.ready().await?;
        Ok(self.contract.is_valid(Some(account), id).await?)
    }

    /// Stored certificate.
    pub async fn get_certificate(&self, id: CertificateId) -> ServiceResult<Certificate> {
        self.ready().await?;
        Ok(self.contract.certificate(id).await?)
    }

    /// Registry overview.
    pub async fn contract_info(&self) -> ServiceResult<ContractInfo> {
        Ok(self.try_contract_info().await?)
    }

    async fn try_contract_info(&self) -> Result<ContractInfo> {
        self.ready().await?;
        Ok(ContractInfo {
            address: self.contract.address(),
            owner: self.contract.owner().await?,
            gas_limit: self.contract.gas_limit().await?,
            certificate_count: self.contract.certificate_count().await?,
            chain_id: self.network.chain_id,
        })
    }
}

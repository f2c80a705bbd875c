//! Typed binding of the registry contract.

use std::time::Duration;

use tracing::{debug, instrument};

use certchain_core::calls::{self, RegistryCall};
use certchain_core::constants::DEFAULT_TX_GAS;
use certchain_core::error::{CertchainError, Result};
use certchain_core::traits::WalletProvider;
use certchain_core::types::{
    Address, Certificate, CertificateId, ContractEvent, TransactionReceipt, TransactionRequest,
    TxHash,
};

/// A mined registry transaction and the events it emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutcome {
    /// Receipt of the transaction
    pub receipt: TransactionReceipt,
    /// Registry events decoded from the receipt logs
    pub events: Vec<ContractEvent>,
}

impl TxOutcome {
    /// Transaction hash.
    pub fn tx_hash(&self) -> TxHash {
        self.receipt.transaction_hash
    }

    /// Certificate id carried by the first event that has one.
    pub fn certificate_id(&self) -> Option<CertificateId> {
        self.events.iter().find_map(ContractEvent::certificate_id)
    }
}

/// Registry contract at `address`, reached through provider `P`.
#[derive(Debug, Clone)]
pub struct RegistryContract<P> {
    provider: P,
    address: Address,
    tx_gas: u64,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl<P: WalletProvider> RegistryContract<P> {
    /// Binds the contract.
    pub fn new(provider: P, address: Address) -> Self {
        Self {
            provider,
            address,
            tx_gas: DEFAULT_TX_GAS,
            poll_interval: Duration::from_millis(500),
            poll_attempts: 60,
        }
    }

    /// Gas supplied with every transaction.
    pub fn with_tx_gas(mut self, gas: u64) -> Self {
        self.tx_gas = gas;
        self
    }

    /// Receipt polling schedule.
    pub fn with_receipt_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts.max(1);
        self
    }

    /// Contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Gas supplied with every transaction.
    pub fn tx_gas(&self) -> u64 {
        self.tx_gas
    }

    /// The provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Runs `call` without a transaction and returns its raw output.
    pub async fn call(&self, from: Option<Address>, call: &RegistryCall) -> Result<Vec<u8>> {
        let mut tx = TransactionRequest::new(self.address, call.encode());
        tx.from = from;
        self.provider.call(tx).await
    }

    /// Sends `call` from `from`, waits for the receipt and decodes events.
    #[instrument(skip(self, call), fields(function = call.name()))]
    pub async fn send(&self, from: Address, call: &RegistryCall) -> Result<TxOutcome> {
        let tx = TransactionRequest::new(self.address, call.encode())
            .from(from)
            .gas(self.tx_gas);
        let hash = self.provider.send_transaction(tx).await?;
        debug!(tx = %hash, "Transaction sent");

        let receipt = self.wait_for_receipt(hash).await?;
        if !receipt.is_success() {
            return Err(CertchainError::TransactionFailed {
                tx_hash: hash.to_hex(),
            });
        }

        let events = receipt
            .logs
            .iter()
            .filter(|log| log.address == self.address)
            .map(ContractEvent::from_log)
            .collect::<Result<Vec<_>>>()?;

        Ok(TxOutcome { receipt, events })
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TransactionReceipt> {
        for attempt in 0..self.poll_attempts {
            if let Some(receipt) = self.provider.transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            if attempt + 1 < self.poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        Err(CertchainError::TransactionNotFound(hash.to_hex()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VIEWS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Registry owner.
    pub async fn owner(&self) -> Result<Address> {
        calls::decode_address(&self.call(None, &RegistryCall::Owner).await?)
    }

    /// Configured gas threshold.
    pub async fn gas_limit(&self) -> Result<u64> {
        calls::decode_uint(&self.call(None, &RegistryCall::GasLimit).await?)
    }

    /// Number of certificates issued.
    pub async fn certificate_count(&self) -> Result<u64> {
        calls::decode_uint(&self.call(None, &RegistryCall::CertificateCount).await?)
    }

    /// Stored certificate.
    pub async fn certificate(&self, id: CertificateId) -> Result<Certificate> {
        calls::decode_certificate(&self.call(None, &RegistryCall::GetCertificate { id }).await?)
    }

    /// Validity of a certificate, read without recording a verification.
    pub async fn is_valid(&self, from: Option<Address>, id: CertificateId) -> Result<bool> {
        calls::decode_bool(
            &self
                .call(from, &RegistryCall::VerifyCertificate { id })
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use certchain_core::types::NetworkConfig;
    use certchain_registry::{DevNode, LocalChain};
    use parking_lot::Mutex;

    use crate::provider::Eip1193Provider;
    use crate::transport::LocalTransport;

    async fn bound() -> (RegistryContract<Eip1193Provider<LocalTransport>>, Address) {
        let chain = Arc::new(LocalChain::dev().unwrap());
        let address = chain.registry_address();
        let provider = Eip1193Provider::new(LocalTransport::new(Arc::new(DevNode::new(chain))));
        let owner = provider.request_accounts().await.unwrap()[0];
        (RegistryContract::new(provider, address), owner)
    }

    #[tokio::test]
    async fn test_send_decodes_events() {
        let (contract, owner) = bound().await;
        let outcome = contract
            .send(owner, &RegistryCall::IssueCertificate { recipient_name: "Ada".into() })
            .await
            .unwrap();
        assert_eq!(outcome.certificate_id(), Some(1));
        assert!(matches!(
            outcome.events[0],
            ContractEvent::CertificateIssued { id: 1, .. }
        ));

        assert_eq!(contract.certificate_count().await.unwrap(), 1);
        assert_eq!(contract.certificate(1).await.unwrap().recipient_name, "Ada");
        assert!(contract.is_valid(Some(owner), 1).await.unwrap());
        assert_eq!(contract.owner().await.unwrap(), owner);
    }

    #[tokio::test]
    async fn test_low_tx_gas_trips_guard() {
        let (contract, owner) = bound().await;
        let contract = contract.with_tx_gas(60_000);
        let err = contract
            .send(owner, &RegistryCall::IssueCertificate { recipient_name: "Ada".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, CertchainError::InsufficientGas { .. }));
    }

    /// A provider whose transactions never get mined.
    struct Unmined {
        polls: Mutex<u32>,
    }

    #[async_trait]
    impl WalletProvider for Unmined {
        async fn request_accounts(&self) -> Result<Vec<Address>> {
            Ok(vec![Address::dev_account(0)])
        }
        async fn chain_id(&self) -> Result<u64> {
            Ok(1)
        }
        async fn switch_chain(&self, _chain_id: u64) -> Result<()> {
            Ok(())
        }
        async fn add_chain(&self, _network: &NetworkConfig) -> Result<()> {
            Ok(())
        }
        async fn send_transaction(&self, _tx: TransactionRequest) -> Result<TxHash> {
            Ok(TxHash::default())
        }
        async fn call(&self, _tx: TransactionRequest) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn transaction_receipt(&self, _hash: TxHash) -> Result<Option<TransactionReceipt>> {
            *self.polls.lock() += 1;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_receipt_timeout() {
        let contract = RegistryContract::new(
            Unmined { polls: Mutex::new(0) },
            Address::dev_account(1),
        )
        .with_receipt_polling(Duration::from_millis(1), 3);

        let err = contract
            .send(Address::dev_account(0), &RegistryCall::RevokeCertificate { id: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, CertchainError::TransactionNotFound(_)));
        assert_eq!(*contract.provider().polls.lock(), 3);
    }
}

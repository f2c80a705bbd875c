//! EIP-1193 provider over a JSON-RPC transport.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::instrument;

use certchain_core::error::{CertchainError, Result};
use certchain_core::traits::WalletProvider;
use certchain_core::types::hexutil::{decode_bytes, decode_quantity, encode_quantity};
use certchain_core::types::{
    Address, NetworkConfig, RawLog, TransactionReceipt, TransactionRequest, TxHash,
};

use crate::transport::Transport;

/// A [`WalletProvider`] speaking EIP-1193 methods over `T`.
#[derive(Debug, Clone)]
pub struct Eip1193Provider<T> {
    transport: T,
}

impl<T: Transport> Eip1193Provider<T> {
    /// Wraps a transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn request_as<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let value = self.transport.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn request_quantity(&self, method: &str, params: Value) -> Result<u64> {
        let value: String = self.request_as(method, params).await?;
        decode_quantity(&value)
    }

    /// Accounts already exposed to the dApp (no prompt).
    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.request_as("eth_accounts", json!([])).await
    }

    /// Latest block number.
    pub async fn block_number(&self) -> Result<u64> {
        self.request_quantity("eth_blockNumber", json!([])).await
    }

    /// Gas estimate for `tx`.
    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        self.request_quantity("eth_estimateGas", json!([tx])).await
    }

    /// Logs of `address` from `from_block` to the latest block.
    pub async fn logs(&self, address: Address, from_block: u64) -> Result<Vec<RawLog>> {
        self.request_as(
            "eth_getLogs",
            json!([{
                "address": address,
                "fromBlock": encode_quantity(from_block),
                "toBlock": "latest",
            }]),
        )
        .await
    }
}

#[async_trait]
impl<T: Transport> WalletProvider for Eip1193Provider<T> {
    #[instrument(skip(self))]
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.request_as("eth_requestAccounts", json!([])).await
    }

    async fn chain_id(&self) -> Result<u64> {
        self.request_quantity("eth_chainId", json!([])).await
    }

    #[instrument(skip(self))]
    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        self.transport
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": encode_quantity(chain_id) }]),
            )
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, network), fields(chain_id = network.chain_id))]
    async fn add_chain(&self, network: &NetworkConfig) -> Result<()> {
        self.transport
            .request("wallet_addEthereumChain", json!([network]))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, tx))]
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash> {
        self.request_as("eth_sendTransaction", json!([tx])).await
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Vec<u8>> {
        let value: String = self.request_as("eth_call", json!([tx, "latest"])).await?;
        decode_bytes(&value)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>> {
        match self
            .transport
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?
        {
            Value::Null => Ok(None),
            value => serde_json::from_value(value)
                .map(Some)
                .map_err(CertchainError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use certchain_core::constants::{LOCAL_CHAIN_ID, SEPOLIA_CHAIN_ID};
    use certchain_core::RegistryCall;
    use certchain_registry::{DevNode, LocalChain};

    use crate::transport::LocalTransport;

    fn provider(node: DevNode) -> Eip1193Provider<LocalTransport> {
        Eip1193Provider::new(LocalTransport::new(Arc::new(node)))
    }

    fn chain() -> Arc<LocalChain> {
        Arc::new(LocalChain::dev().unwrap())
    }

    #[tokio::test]
    async fn test_accounts_and_chain_id() {
        let provider = provider(DevNode::new(chain()));
        assert!(provider.accounts().await.unwrap().is_empty());
        assert_eq!(provider.request_accounts().await.unwrap().len(), 10);
        assert_eq!(provider.chain_id().await.unwrap(), LOCAL_CHAIN_ID);
    }

    #[tokio::test]
    async fn test_switch_unknown_chain_then_add() {
        let provider = provider(DevNode::fresh_wallet(chain()));
        assert_eq!(provider.chain_id().await.unwrap(), SEPOLIA_CHAIN_ID);

        let err = provider.switch_chain(LOCAL_CHAIN_ID).await.unwrap_err();
        assert!(matches!(err, CertchainError::UnrecognizedChain(_)));

        provider.add_chain(&NetworkConfig::local()).await.unwrap();
        provider.switch_chain(LOCAL_CHAIN_ID).await.unwrap();
        assert_eq!(provider.chain_id().await.unwrap(), LOCAL_CHAIN_ID);
    }

    #[tokio::test]
    async fn test_send_and_receipt() {
        let chain = chain();
        let registry = chain.registry_address();
        let provider = provider(DevNode::new(chain));
        let owner = provider.request_accounts().await.unwrap()[0];

        let tx = TransactionRequest::new(
            registry,
            RegistryCall::IssueCertificate { recipient_name: "Ada".into() }.encode(),
        )
        .from(owner);
        let hash = provider.send_transaction(tx).await.unwrap();
        let receipt = provider.transaction_receipt(hash).await.unwrap().unwrap();
        assert!(receipt.is_success());
        assert_eq!(provider.block_number().await.unwrap(), 1);
        assert_eq!(provider.logs(registry, 0).await.unwrap().len(), 1);

        let unknown = provider.transaction_receipt(TxHash::default()).await.unwrap();
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn test_call_revert_is_typed() {
        let chain = chain();
        let registry = chain.registry_address();
        let provider = provider(DevNode::new(chain));

        let tx = TransactionRequest::new(registry, RegistryCall::GetCertificate { id: 9 }.encode());
        let err = provider.call(tx).await.unwrap_err();
        assert!(matches!(err, CertchainError::CertificateNotFound(9)));
    }
}

//! JSON-RPC dev node.
//!
//! Serves the local chain over the Ethereum JSON-RPC methods a dApp uses
//! and plays the part of the user's wallet (EIP-1193): it tracks which
//! chain is active, which chains are known, and whether the dApp has been
//! granted accounts. This is enough to exercise network switching and
//! wallet error handling without a browser extension.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use certchain_core::constants::{RPC_METHOD_NOT_FOUND, SEPOLIA_CHAIN_ID};
use certchain_core::error::{CertchainError, Result};
use certchain_core::types::hexutil::{decode_quantity, encode_bytes, encode_quantity};
use certchain_core::types::{
    find_network, NetworkConfig, RpcErrorObject, RpcRequest, RpcResponse, TransactionRequest,
    TxHash,
};

use crate::chain::SharedChain;

#[derive(Debug)]
struct WalletState {
    active_chain: u64,
    known_chains: BTreeMap<u64, NetworkConfig>,
    connected: bool,
    rejects: bool,
}

/// Log filter of `eth_getLogs`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogFilter {
    #[serde(default)]
    from_block: Option<String>,
    #[serde(default)]
    to_block: Option<String>,
    #[serde(default)]
    address: Option<certchain_core::types::Address>,
}

/// A JSON-RPC endpoint backed by a [`LocalChain`](crate::LocalChain).
#[derive(Debug)]
pub struct DevNode {
    chain: SharedChain,
    wallet: RwLock<WalletState>,
}

impl DevNode {
    /// A node whose wallet already knows and is connected to the served chain.
    pub fn new(chain: SharedChain) -> Self {
        let served = Self::served_network(&chain);
        let mut known_chains = BTreeMap::new();
        known_chains.insert(served.chain_id, served);
        if let Some(sepolia) = find_network(SEPOLIA_CHAIN_ID) {
            known_chains.entry(sepolia.chain_id).or_insert(sepolia);
        }

        Self {
            wallet: RwLock::new(WalletState {
                active_chain: chain.chain_id(),
                known_chains,
                connected: false,
                rejects: false,
            }),
            chain,
        }
    }

    /// A node whose wallet sits on Sepolia and has never heard of the
    /// served chain, like a freshly installed browser wallet.
    pub fn fresh_wallet(chain: SharedChain) -> Self {
        let node = Self::new(chain);
        {
            let mut wallet = node.wallet.write();
            let served = node.chain.chain_id();
            if served != SEPOLIA_CHAIN_ID {
                wallet.known_chains.remove(&served);
                wallet.active_chain = SEPOLIA_CHAIN_ID;
            }
        }
        node
    }

    fn served_network(chain: &SharedChain) -> NetworkConfig {
        let mut network = NetworkConfig::local();
        network.chain_id = chain.chain_id();
        network
    }

    /// The chain behind this node.
    pub fn chain(&self) -> &SharedChain {
        &self.chain
    }

    /// Chain the wallet currently points at.
    pub fn active_chain_id(&self) -> u64 {
        self.wallet.read().active_chain
    }

    /// Makes the simulated user reject (or accept) every prompt.
    pub fn set_user_rejects(&self, rejects: bool) {
        self.wallet.write().rejects = rejects;
    }

    /// Moves the wallet to `chain_id` without a prompt.
    pub fn set_active_chain(&self, chain_id: u64) {
        self.wallet.write().active_chain = chain_id;
    }

    /// Handles one JSON-RPC request.
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub fn handle(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        match self.dispatch(&request) {
            Ok(result) => RpcResponse::success(id, result),
            Err(err) => {
                debug!(error = %err, "RPC request failed");
                RpcResponse::failure(id, RpcErrorObject::from_error(&err))
            }
        }
    }

    fn prompt(&self) -> Result<()> {
        if self.wallet.read().rejects {
            return Err(CertchainError::UserRejected);
        }
        Ok(())
    }

    fn require_served_chain(&self) -> Result<()> {
        let active = self.wallet.read().active_chain;
        if active != self.chain.chain_id() {
            return Err(CertchainError::ChainDisconnected(format!(
                "Provider is not connected to chain {}",
                encode_quantity(active)
            )));
        }
        Ok(())
    }

    fn tx_param(request: &RpcRequest) -> Result<TransactionRequest> {
        match request.param(0) {
            Value::Null => Err(CertchainError::ValidationError(
                "missing transaction object".into(),
            )),
            value => Ok(serde_json::from_value(value.clone())?),
        }
    }

    fn block_param(&self, tag: Option<&str>, default: u64) -> Result<u64> {
        match tag {
            None => Ok(default),
            Some("earliest") => Ok(0),
            Some("latest") | Some("pending") | Some("safe") | Some("finalized") => {
                Ok(self.chain.block_number())
            }
            Some(quantity) => decode_quantity(quantity),
        }
    }

    fn dispatch(&self, request: &RpcRequest) -> Result<Value> {
        match request.method.as_str() {
            "eth_chainId" => Ok(json!(encode_quantity(self.active_chain_id()))),
            "net_version" => Ok(json!(self.active_chain_id().to_string())),
            "eth_accounts" => {
                if self.wallet.read().connected {
                    Ok(json!(self.chain.accounts()))
                } else {
                    Ok(json!([]))
                }
            }
            "eth_requestAccounts" => {
                self.prompt()?;
                self.wallet.write().connected = true;
                Ok(json!(self.chain.accounts()))
            }
            "eth_blockNumber" => {
                self.require_served_chain()?;
                Ok(json!(encode_quantity(self.chain.block_number())))
            }
            "eth_sendTransaction" => {
                let mut tx = Self::tx_param(request)?;
                if !self.wallet.read().connected {
                    return Err(CertchainError::AccountNotAuthorized);
                }
                self.require_served_chain()?;
                self.prompt()?;
                if tx.from.is_none() {
                    tx.from = self.chain.accounts().first().copied();
                }
                let receipt = self.chain.send_transaction(tx)?;
                Ok(json!(receipt.transaction_hash))
            }
            "eth_call" => {
                self.require_served_chain()?;
                let output = self.chain.call(&Self::tx_param(request)?)?;
                Ok(json!(encode_bytes(&output)))
            }
            "eth_estimateGas" => {
                self.require_served_chain()?;
                let gas = self.chain.estimate_gas(&Self::tx_param(request)?)?;
                Ok(json!(encode_quantity(gas)))
            }
            "eth_getTransactionReceipt" => {
                let hash: TxHash = serde_json::from_value(request.param(0).clone())?;
                Ok(json!(self.chain.receipt(&hash)))
            }
            "eth_getLogs" => {
                self.require_served_chain()?;
                let filter: LogFilter = match request.param(0) {
                    Value::Null => LogFilter::default(),
                    value => serde_json::from_value(value.clone())?,
                };
                if filter
                    .address
                    .is_some_and(|a| a != self.chain.registry_address())
                {
                    return Ok(json!([]));
                }
                let from = self.block_param(filter.from_block.as_deref(), 0)?;
                let to = self.block_param(filter.to_block.as_deref(), self.chain.block_number())?;
                Ok(json!(self.chain.logs(from, Some(to))))
            }
            "wallet_switchEthereumChain" => {
                let chain_id = request
                    .param(0)
                    .get("chainId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CertchainError::ValidationError("missing chainId".into()))
                    .and_then(decode_quantity)?;
                self.prompt()?;
                let mut wallet = self.wallet.write();
                if !wallet.known_chains.contains_key(&chain_id) {
                    return Err(CertchainError::UnrecognizedChain(format!(
                        "Unrecognized chain ID \"{}\". Try adding the chain using wallet_addEthereumChain first.",
                        encode_quantity(chain_id)
                    )));
                }
                wallet.active_chain = chain_id;
                debug!(chain_id, "Switched active chain");
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let network: NetworkConfig = serde_json::from_value(request.param(0).clone())?;
                self.prompt()?;
                debug!(chain_id = network.chain_id, name = %network.chain_name, "Added chain");
                self.wallet
                    .write()
                    .known_chains
                    .insert(network.chain_id, network);
                Ok(Value::Null)
            }
            other => Err(CertchainError::Provider {
                code: RPC_METHOD_NOT_FOUND,
                message: format!("the method {} does not exist/is not available", other),
            }),
        }
    }
}

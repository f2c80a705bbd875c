//! Networks a wallet can be asked to switch to.
//!
//! Serialized in the `wallet_addEthereumChain` parameter shape.

use serde::{Deserialize, Serialize};

use crate::constants::{AMOY_CHAIN_ID, DEFAULT_LOCAL_RPC_URL, LOCAL_CHAIN_ID, SEPOLIA_CHAIN_ID};
use crate::types::hexutil;

/// Native currency of a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Display name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimals (18 on every EVM chain we know of)
    pub decimals: u8,
}

impl NativeCurrency {
    fn ether(name: &str, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals: 18,
        }
    }
}

/// Chain parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// EIP-155 chain id
    #[serde(with = "hexutil::quantity")]
    pub chain_id: u64,
    /// Human-readable name
    pub chain_name: String,
    /// JSON-RPC endpoints
    pub rpc_urls: Vec<String>,
    /// Native currency
    pub native_currency: NativeCurrency,
    /// Block explorers
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
}

impl NetworkConfig {
    /// The local development chain.
    pub fn local() -> Self {
        Self {
            chain_id: LOCAL_CHAIN_ID,
            chain_name: "CertChain Local".to_string(),
            rpc_urls: vec![DEFAULT_LOCAL_RPC_URL.to_string()],
            native_currency: NativeCurrency::ether("Ether", "ETH"),
            block_explorer_urls: Vec::new(),
        }
    }

    /// Ethereum Sepolia testnet.
    pub fn sepolia() -> Self {
        Self {
            chain_id: SEPOLIA_CHAIN_ID,
            chain_name: "Sepolia".to_string(),
            rpc_urls: vec!["https://rpc.sepolia.org".to_string()],
            native_currency: NativeCurrency::ether("Sepolia Ether", "ETH"),
            block_explorer_urls: vec!["https://sepolia.etherscan.io".to_string()],
        }
    }

    /// Polygon Amoy testnet.
    pub fn amoy() -> Self {
        Self {
            chain_id: AMOY_CHAIN_ID,
            chain_name: "Polygon Amoy".to_string(),
            rpc_urls: vec!["https://rpc-amoy.polygon.technology".to_string()],
            native_currency: NativeCurrency::ether("POL", "POL"),
            block_explorer_urls: vec!["https://amoy.polygonscan.com".to_string()],
        }
    }

    /// Replaces the RPC endpoints with a single URL.
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_urls = vec![url.into()];
        self
    }

    /// Chain id as a hex quantity (`wallet_switchEthereumChain` form).
    pub fn chain_id_hex(&self) -> String {
        hexutil::encode_quantity(self.chain_id)
    }
}

/// All built-in networks.
pub fn known_networks() -> Vec<NetworkConfig> {
    vec![NetworkConfig::local(), NetworkConfig::sepolia(), NetworkConfig::amoy()]
}

/// Looks up a built-in network by chain id.
pub fn find_network(chain_id: u64) -> Option<NetworkConfig> {
    known_networks().into_iter().find(|n| n.chain_id == chain_id)
}

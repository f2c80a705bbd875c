//! Client configuration from the environment.

use serde::{Deserialize, Serialize};
use url::Url;

use certchain_core::constants::{DEFAULT_LOCAL_RPC_URL, DEFAULT_TX_GAS, LOCAL_CHAIN_ID};
use certchain_core::error::{CertchainError, Result};
use certchain_core::types::hexutil::decode_quantity;
use certchain_core::types::{find_network, Address, NetworkConfig};
use certchain_ipfs::PinataConfig;

/// Certificate service configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Network the wallet must be on
    pub network: NetworkConfig,
    /// Registry address
    pub contract_address: Option<Address>,
    /// Gas supplied with every transaction
    pub tx_gas: u64,
    /// HTTP timeout in seconds
    pub timeout_seconds: u64,
    /// Pinning service settings
    pub pinata: PinataConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_LOCAL_RPC_URL.into(),
            network: NetworkConfig::local(),
            contract_address: None,
            tx_gas: DEFAULT_TX_GAS,
            timeout_seconds: 30,
            pinata: PinataConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Loads `.env` if present, then reads `CERTCHAIN_RPC_URL`,
    /// `CERTCHAIN_CHAIN_ID`, `CERTCHAIN_CONTRACT_ADDRESS`, `CERTCHAIN_TX_GAS`
    /// and the Pinata variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.pinata = PinataConfig::from_env();
        Ok(config)
    }

    /// Builds a config from a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rpc_url = match var("CERTCHAIN_RPC_URL") {
            Some(url) => validate_rpc_url(&url)?,
            None => DEFAULT_LOCAL_RPC_URL.to_string(),
        };

        let chain_id = match var("CERTCHAIN_CHAIN_ID") {
            Some(raw) => parse_chain_id(&raw)?,
            None => LOCAL_CHAIN_ID,
        };
        let network = network_for(chain_id, &rpc_url);

        let contract_address = var("CERTCHAIN_CONTRACT_ADDRESS")
            .map(|raw| Address::from_hex(raw.trim()))
            .transpose()
            .map_err(|e| CertchainError::ConfigError(format!("CERTCHAIN_CONTRACT_ADDRESS: {}", e)))?;

        let tx_gas = match var("CERTCHAIN_TX_GAS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                CertchainError::ConfigError(format!("CERTCHAIN_TX_GAS: {}", e))
            })?,
            None => DEFAULT_TX_GAS,
        };

        Ok(Self {
            rpc_url,
            network,
            contract_address,
            tx_gas,
            ..Default::default()
        })
    }
}

/// Accepts `http(s)` URLs only.
pub fn validate_rpc_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim())
        .map_err(|e| CertchainError::ConfigError(format!("invalid RPC URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(CertchainError::ConfigError(format!(
            "unsupported RPC URL scheme '{}'",
            other
        ))),
    }
}

/// Parses a decimal or `0x` chain id.
pub fn parse_chain_id(raw: &str) -> Result<u64> {
    decode_quantity(raw)
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| CertchainError::ConfigError(format!("invalid chain id '{}'", raw)))
}

/// Known network parameters for `chain_id`, or a local-style network.
pub fn network_for(chain_id: u64, rpc_url: &str) -> NetworkConfig {
    let network = find_network(chain_id).unwrap_or_else(|| {
        let mut network = NetworkConfig::local();
        network.chain_id = chain_id;
        network
    });
    if chain_id == LOCAL_CHAIN_ID || find_network(chain_id).is_none() {
        network.with_rpc_url(rpc_url)
    } else {
        network
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use certchain_core::constants::SEPOLIA_CHAIN_ID;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.network.chain_id, LOCAL_CHAIN_ID);
        assert_eq!(config.tx_gas, DEFAULT_TX_GAS);
        assert!(config.contract_address.is_none());
    }

    #[test]
    fn test_full_env() {
        let address = Address::dev_account(3).to_checksum_string();
        let config = ClientConfig::from_lookup(lookup(&[
            ("CERTCHAIN_RPC_URL", "https://rpc.sepolia.org"),
            ("CERTCHAIN_CHAIN_ID", "0xaa36a7"),
            ("CERTCHAIN_CONTRACT_ADDRESS", address.as_str()),
            ("CERTCHAIN_TX_GAS", "250000"),
        ]))
        .unwrap();
        assert_eq!(config.network.chain_id, SEPOLIA_CHAIN_ID);
        assert_eq!(config.contract_address, Some(Address::dev_account(3)));
        assert_eq!(config.tx_gas, 250_000);
        assert!(config.rpc_url.starts_with("https://rpc.sepolia.org"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(ClientConfig::from_lookup(lookup(&[("CERTCHAIN_RPC_URL", "not a url")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("CERTCHAIN_RPC_URL", "ftp://x.org")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("CERTCHAIN_CHAIN_ID", "zero")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("CERTCHAIN_CHAIN_ID", "0")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("CERTCHAIN_CONTRACT_ADDRESS", "0x12")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("CERTCHAIN_TX_GAS", "-1")])).is_err());
    }

    #[test]
    fn test_unknown_chain_uses_rpc_url() {
        let network = network_for(1337, "http://10.0.0.2:8545");
        assert_eq!(network.chain_id, 1337);
        assert_eq!(network.rpc_urls, vec!["http://10.0.0.2:8545".to_string()]);
    }
}

//! # CertChain Client
//!
//! The client side of the certificate dApp.
//!
//! - **Transports**: JSON-RPC over HTTP, or straight into an in-process
//!   dev node
//! - **Provider**: EIP-1193 wallet methods with typed errors
//! - **Contract**: the registry binding (calldata, receipts, events)
//! - **Service**: connection, network switching and the certificate
//!   operations, failing with user-facing messages
//!
//! ## Example
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use std::sync::Arc;
//! use certchain_client::{CertificateService, Eip1193Provider, LocalTransport, RegistryContract};
//! use certchain_core::NetworkConfig;
//! use certchain_registry::{DevNode, LocalChain};
//!
//! let chain = Arc::new(LocalChain::dev().unwrap());
//! let registry = chain.registry_address();
//! let provider = Eip1193Provider::new(LocalTransport::new(Arc::new(DevNode::new(chain))));
//! let service = CertificateService::new(
//!     RegistryContract::new(provider, registry),
//!     NetworkConfig::local(),
//! );
//!
//! service.connect().await.unwrap();
//! let (id, _) = service.issue_certificate("Ada Lovelace", None).await.unwrap();
//! assert!(service.verify_certificate(id).await.unwrap());
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod contract;
mod errors;
mod provider;
mod service;
mod transport;

pub use config::{network_for, parse_chain_id, validate_rpc_url, ClientConfig};
pub use contract::{RegistryContract, TxOutcome};
pub use errors::{user_message, ServiceError, ServiceResult};
pub use provider::Eip1193Provider;
pub use service::{CertificateService, ContractInfo};
pub use transport::{HttpTransport, LocalTransport, Transport};

/// Service over JSON-RPC/HTTP.
pub type HttpCertificateService = CertificateService<Eip1193Provider<HttpTransport>>;

impl HttpCertificateService {
    /// Builds a service from `config`. Fails without a contract address.
    pub fn from_config(config: &ClientConfig) -> certchain_core::Result<Self> {
        let address = config.contract_address.ok_or_else(|| {
            certchain_core::CertchainError::ConfigError(
                "CERTCHAIN_CONTRACT_ADDRESS is not set".into(),
            )
        })?;
        let transport = HttpTransport::new(config.rpc_url.clone(), config.timeout_seconds)?;
        let contract = RegistryContract::new(Eip1193Provider::new(transport), address)
            .with_tx_gas(config.tx_gas);
        Ok(CertificateService::new(contract, config.network.clone()))
    }
}

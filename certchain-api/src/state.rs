//! App state: the chain, its dev node, persistence and pinning.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use certchain_core::constants::{DEFAULT_GAS_LIMIT, LOCAL_CHAIN_ID};
use certchain_core::error::{CertchainError, Result};
use certchain_core::traits::PinningService;
use certchain_core::types::hexutil::decode_quantity;
use certchain_ipfs::{MemoryPinningService, PinataClient, PinataConfig};
use certchain_registry::{ChainConfig, ChainStore, DevNode, LocalChain, SharedChain};

/// Default request body limit (1 MiB).
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Chain id of a freshly created chain
    pub chain_id: u64,
    /// Initial registry gas threshold of a freshly created chain
    pub gas_limit: u64,
    /// Snapshot file; `None` keeps the chain in memory only
    pub state_file: Option<PathBuf>,
    /// Pinata settings
    pub pinata: PinataConfig,
    /// Pin into process memory when Pinata is not configured
    pub memory_ipfs: bool,
    /// Maximum request body size in bytes
    pub body_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            chain_id: LOCAL_CHAIN_ID,
            gas_limit: DEFAULT_GAS_LIMIT,
            state_file: None,
            pinata: PinataConfig::default(),
            memory_ipfs: false,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ApiConfig {
    /// Reads `CERTCHAIN_CHAIN_ID`, `CERTCHAIN_GAS_LIMIT`,
    /// `CERTCHAIN_STATE_FILE`, `CERTCHAIN_MEMORY_IPFS` and the Pinata
    /// variables, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let chain_id = match var("CERTCHAIN_CHAIN_ID") {
            Some(raw) => decode_quantity(&raw)
                .map_err(|e| CertchainError::ConfigError(format!("CERTCHAIN_CHAIN_ID: {}", e)))?,
            None => defaults.chain_id,
        };
        let gas_limit = match var("CERTCHAIN_GAS_LIMIT") {
            Some(raw) => raw.trim().parse().map_err(|e| {
                CertchainError::ConfigError(format!("CERTCHAIN_GAS_LIMIT: {}", e))
            })?,
            None => defaults.gas_limit,
        };

        Ok(Self {
            chain_id,
            gas_limit,
            state_file: var("CERTCHAIN_STATE_FILE").map(PathBuf::from),
            pinata: PinataConfig::from_env(),
            memory_ipfs: var("CERTCHAIN_MEMORY_IPFS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(false),
            body_limit: defaults.body_limit,
        })
    }

    fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            chain_id: self.chain_id,
            gas_limit: self.gas_limit,
            ..Default::default()
        }
    }
}

/// Shared handler state.
pub struct AppState {
    /// Configuration the server started with
    pub config: ApiConfig,
    /// JSON-RPC endpoint over the chain
    pub node: DevNode,
    /// Snapshot store, when persistence is enabled
    pub store: Option<ChainStore>,
    /// Pinning service, when configured
    pub pinning: Option<Arc<dyn PinningService>>,
    persist_lock: tokio::sync::Mutex<()>,
    started: Instant,
}

impl AppState {
    /// Opens the configured state file (or starts a fresh chain) and sets
    /// up pinning.
    pub async fn open(config: ApiConfig) -> Result<Self> {
        let store = config.state_file.as_ref().map(ChainStore::new);
        let chain = match &store {
            Some(store) => store.open_or_create(config.chain_config()).await?,
            None => LocalChain::new(config.chain_config())?,
        };
        let pinning = Self::pinning_for(&config)?;
        Ok(Self::assemble(config, Arc::new(chain), store, pinning))
    }

    /// State around an existing chain, without persistence or pinning.
    pub fn with_chain(config: ApiConfig, chain: SharedChain) -> Self {
        Self::assemble(config, chain, None, None)
    }

    /// Replaces the pinning service.
    pub fn with_pinning(mut self, pinning: Arc<dyn PinningService>) -> Self {
        self.pinning = Some(pinning);
        self
    }

    fn assemble(
        config: ApiConfig,
        chain: SharedChain,
        store: Option<ChainStore>,
        pinning: Option<Arc<dyn PinningService>>,
    ) -> Self {
        info!(
            chain_id = chain.chain_id(),
            registry = %chain.registry_address(),
            persistent = store.is_some(),
            pinning = pinning.is_some(),
            "App state ready"
        );
        Self {
            config,
            node: DevNode::new(chain),
            store,
            pinning,
            persist_lock: tokio::sync::Mutex::new(()),
            started: Instant::now(),
        }
    }

    fn pinning_for(config: &ApiConfig) -> Result<Option<Arc<dyn PinningService>>> {
        if config.pinata.can_upload() {
            let client = PinataClient::new(config.pinata.clone())?;
            return Ok(Some(Arc::new(client)));
        }
        if config.memory_ipfs {
            return Ok(Some(Arc::new(MemoryPinningService::new())));
        }
        Ok(None)
    }

    /// The chain.
    pub fn chain(&self) -> &SharedChain {
        self.node.chain()
    }

    /// Seconds since start.
    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Writes a snapshot if persistence is enabled. Failures are logged;
    /// the transaction that triggered the write has already been mined.
    pub async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let _guard = self.persist_lock.lock().await;
        if let Err(err) = store.persist(self.chain()).await {
            error!(error = %err, path = %store.path().display(), "Failed to persist chain");
        }
    }
}

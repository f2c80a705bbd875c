//! Snapshot persistence for the local chain.
//!
//! Lets the CLI and the API server keep certificates across restarts.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument};

use certchain_core::error::{CertchainError, Result};

use crate::chain::{ChainConfig, ChainSnapshot, LocalChain};

/// File format magic bytes
const MAGIC: &[u8; 4] = b"CERT";
/// Current file format version
const VERSION: u8 = 1;
/// magic + version + block number
const HEADER_LEN: usize = 13;

/// Reads and writes chain snapshots.
///
/// # File Format
///
/// ```text
/// magic (4 bytes): "CERT"
/// version (1 byte): 1
/// block number (8 bytes, little endian): latest mined block
/// snapshot (variable): JSON-serialized chain state
/// ```
#[derive(Clone, Debug)]
pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    /// Creates a store backed by `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot, or `None` if the file does not exist yet.
    #[instrument(skip(self), fields(path = ?self.path))]
    pub async fn load(&self) -> Result<Option<ChainSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut file = fs::File::open(&self.path).await.map_err(|e| {
            CertchainError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to open state file: {}", e),
            ))
        })?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;

        if contents.len() < HEADER_LEN {
            return Err(CertchainError::StorageError("File too short".into()));
        }
        if &contents[0..4] != MAGIC {
            return Err(CertchainError::StorageError("Invalid magic bytes".into()));
        }
        let version = contents[4];
        if version != VERSION {
            return Err(CertchainError::VersionMismatch {
                expected: VERSION,
                actual: version,
            });
        }

        let mut block_bytes = [0u8; 8];
        block_bytes.copy_from_slice(&contents[5..HEADER_LEN]);
        let block_number = u64::from_le_bytes(block_bytes);

        let snapshot: ChainSnapshot = serde_json::from_slice(&contents[HEADER_LEN..])
            .map_err(|e| CertchainError::StorageError(format!("Corrupted snapshot: {}", e)))?;
        if snapshot.block_number != block_number {
            return Err(CertchainError::StorageError(format!(
                "Header block {} does not match snapshot block {}",
                block_number, snapshot.block_number
            )));
        }

        info!(block_number, "Loaded chain snapshot");
        Ok(Some(snapshot))
    }

    /// Writes a snapshot atomically (temp file, then rename).
    #[instrument(skip(self, snapshot), fields(path = ?self.path, block = snapshot.block_number))]
    pub async fn save(&self, snapshot: &ChainSnapshot) -> Result<()> {
        let serialized = serde_json::to_vec(snapshot)?;

        let mut contents = Vec::with_capacity(HEADER_LEN + serialized.len());
        contents.extend_from_slice(MAGIC);
        contents.push(VERSION);
        contents.extend_from_slice(&snapshot.block_number.to_le_bytes());
        contents.extend_from_slice(&serialized);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!("Chain snapshot saved");
        Ok(())
    }

    /// Restores the chain from disk, or starts a fresh one with `config`.
    ///
    /// A saved chain must carry the configured chain id.
    pub async fn open_or_create(&self, config: ChainConfig) -> Result<LocalChain> {
        match self.load().await? {
            Some(snapshot) if snapshot.chain_id != config.chain_id => {
                Err(CertchainError::ConfigError(format!(
                    "{} holds chain {} but chain {} is configured",
                    self.path.display(),
                    snapshot.chain_id,
                    config.chain_id
                )))
            }
            Some(snapshot) => LocalChain::from_snapshot(snapshot),
            None => LocalChain::new(config),
        }
    }

    /// Saves the chain's current state.
    pub async fn persist(&self, chain: &LocalChain) -> Result<()> {
        self.save(&chain.snapshot()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certchain_core::types::TransactionRequest;
    use certchain_core::RegistryCall;
    use tempfile::tempdir;

    fn issue(chain: &LocalChain, name: &str) {
        let tx = TransactionRequest::new(
            chain.registry_address(),
            RegistryCall::IssueCertificate {
                recipient_name: name.into(),
            }
            .encode(),
        )
        .from(chain.accounts()[0]);
        chain.send_transaction(tx).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let store = ChainStore::new(dir.path().join("state.bin"));
        assert!(store.load().await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");

        {
            let store = ChainStore::new(&path);
            let chain = store.open_or_create(ChainConfig::default()).await.unwrap();
            issue(&chain, "Alice");
            issue(&chain, "Bob");
            store.persist(&chain).await.unwrap();
        }

        {
            let store = ChainStore::new(&path);
            let chain = store.open_or_create(ChainConfig::default()).await.unwrap();
            assert_eq!(chain.certificate_count(), 2);
            assert_eq!(chain.block_number(), 2);
            assert_eq!(chain.certificate(2).unwrap().recipient_name, "Bob");
        }
    }

    #[tokio::test]
    async fn test_chain_id_must_match_config() {
        let dir = tempdir().unwrap();
        let store = ChainStore::new(dir.path().join("state.bin"));
        store.persist(&LocalChain::dev().unwrap()).await.unwrap();

        let sepolia = ChainConfig {
            chain_id: 11_155_111,
            ..ChainConfig::default()
        };
        let result = store.open_or_create(sepolia).await;
        assert!(matches!(result, Err(CertchainError::ConfigError(_))));

        let chain = store.open_or_create(ChainConfig::default()).await.unwrap();
        assert_eq!(chain.chain_id(), 31_337);
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.bin");
        let store = ChainStore::new(&path);
        store.persist(&LocalChain::dev().unwrap()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_invalid_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");
        fs::write(&path, b"invalid data").await.unwrap();

        let result = ChainStore::new(&path).load().await;
        assert!(matches!(result, Err(CertchainError::StorageError(_))));
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let mut contents = MAGIC.to_vec();
        contents.push(VERSION + 1);
        contents.extend_from_slice(&0u64.to_le_bytes());
        fs::write(&path, contents).await.unwrap();

        let result = ChainStore::new(&path).load().await;
        assert!(matches!(
            result,
            Err(CertchainError::VersionMismatch { expected: 1, actual: 2 })
        ));
    }

    #[tokio::test]
    async fn test_header_must_match_body() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let store = ChainStore::new(&path);
        let chain = LocalChain::dev().unwrap();
        issue(&chain, "Alice");
        store.persist(&chain).await.unwrap();

        let mut contents = fs::read(&path).await.unwrap();
        contents[5] = 9;
        fs::write(&path, contents).await.unwrap();
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn test_atomic_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let temp_path = path.with_extension("tmp");

        ChainStore::new(&path)
            .persist(&LocalChain::dev().unwrap())
            .await
            .unwrap();

        assert!(!temp_path.exists());
        assert!(path.exists());
    }
}

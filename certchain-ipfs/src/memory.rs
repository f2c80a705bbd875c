//! In-process pinning service for the dev node and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use sha3::{Digest, Keccak256};
use tracing::debug;

use certchain_core::error::{CertchainError, Result};
use certchain_core::traits::PinningService;

use crate::cid::validate_cid;

/// CIDv1 prefix: version 1, raw codec, keccak-256 multihash of 32 bytes.
const CID_PREFIX: [u8; 4] = [0x01, 0x55, 0x1b, 0x20];

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

fn base32_lower(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Content address of `data` as a base32 CIDv1 (`bafk…`).
pub fn content_cid(data: &[u8]) -> String {
    let mut bytes = CID_PREFIX.to_vec();
    bytes.extend_from_slice(&Keccak256::digest(data));
    format!("b{}", base32_lower(&bytes))
}

/// Content-addressed store kept in memory.
///
/// Pinning identical bytes twice yields the same CID.
#[derive(Debug, Default)]
pub struct MemoryPinningService {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryPinningService {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pinned objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when nothing is pinned.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn store(&self, data: Vec<u8>, name: &str) -> String {
        let cid = content_cid(&data);
        debug!(%cid, name, size = data.len(), "Pinned in memory");
        self.objects.insert(cid.clone(), data);
        cid
    }
}

#[async_trait]
impl PinningService for MemoryPinningService {
    async fn pin_file(&self, data: Vec<u8>, name: &str) -> Result<String> {
        if data.is_empty() {
            return Err(CertchainError::IpfsUploadFailed("empty file".into()));
        }
        Ok(self.store(data, name))
    }

    async fn pin_json(&self, value: &Value, name: &str) -> Result<String> {
        let data = serde_json::to_vec(value)?;
        Ok(self.store(data, name))
    }

    async fn fetch(&self, cid: &str) -> Result<Vec<u8>> {
        validate_cid(cid)?;
        self.objects
            .get(cid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CertchainError::IpfsDownloadFailed {
                cid: cid.to_string(),
                reason: "not pinned".into(),
            })
    }

    async fn unpin(&self, cid: &str) -> Result<()> {
        validate_cid(cid)?;
        self.objects.remove(cid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base32_lower() {
        assert_eq!(base32_lower(b""), "");
        assert_eq!(base32_lower(b"f"), "my");
        assert_eq!(base32_lower(b"foobar"), "mzxw6ytboi");
    }

    #[test]
    fn test_content_cid_shape() {
        let cid = content_cid(b"hello");
        assert!(cid.starts_with("bafk"));
        assert_eq!(cid.len(), 59);
        assert!(validate_cid(&cid).is_ok());
        assert_eq!(cid, content_cid(b"hello"));
        assert_ne!(cid, content_cid(b"hello!"));
    }

    #[tokio::test]
    async fn test_pin_fetch_unpin() {
        let service = MemoryPinningService::new();
        let cid = service.pin_file(b"diploma".to_vec(), "diploma.pdf").await.unwrap();
        assert_eq!(service.fetch(&cid).await.unwrap(), b"diploma");
        assert_eq!(service.len(), 1);

        service.unpin(&cid).await.unwrap();
        assert!(service.is_empty());
        assert!(matches!(
            service.fetch(&cid).await,
            Err(CertchainError::IpfsDownloadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_pin_json_is_content_addressed() {
        let service = MemoryPinningService::new();
        let a = service.pin_json(&json!({ "name": "Rust 101" }), "a").await.unwrap();
        let b = service.pin_json(&json!({ "name": "Rust 101" }), "b").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(service.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let service = MemoryPinningService::new();
        assert!(service.pin_file(Vec::new(), "empty").await.is_err());
    }
}

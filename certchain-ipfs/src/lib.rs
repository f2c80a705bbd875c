//! # CertChain IPFS
//!
//! Pinning of certificate documents and metadata.
//!
//! - [`PinataClient`]: Pinata v3 uploads plus gateway retrieval
//! - [`MemoryPinningService`]: content-addressed in-process store for the
//!   dev node and tests
//! - [`pin_metadata`] / [`fetch_metadata`]: metadata helpers over any
//!   [`PinningService`]
//!
//! ## Example
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use certchain_core::CertificateMetadata;
//! use certchain_ipfs::{fetch_metadata, pin_metadata, MemoryPinningService};
//!
//! let ipfs = MemoryPinningService::new();
//! let meta = CertificateMetadata::new("Rust 101", "Ferris", "Crab University");
//! let uri = pin_metadata(&ipfs, &meta).await.unwrap();
//! assert!(uri.starts_with("ipfs://"));
//! assert_eq!(fetch_metadata(&ipfs, &uri).await.unwrap(), meta);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cid;
mod memory;
mod pinata;

use tracing::instrument;

use certchain_core::error::{CertchainError, Result};
use certchain_core::traits::PinningService;
use certchain_core::types::CertificateMetadata;

pub use cid::{ipfs_uri, parse_ipfs_uri, validate_cid};
pub use memory::{content_cid, MemoryPinningService};
pub use pinata::{PinataClient, PinataConfig};

/// Validates and pins certificate metadata, returning its `ipfs://` URI.
#[instrument(skip_all, fields(recipient = %metadata.recipient))]
pub async fn pin_metadata<S>(service: &S, metadata: &CertificateMetadata) -> Result<String>
where
    S: PinningService + ?Sized,
{
    metadata.validate()?;
    let value = serde_json::to_value(metadata)?;
    let name = format!("certificate-{}", metadata.recipient);
    let cid = service.pin_json(&value, &name).await?;
    Ok(ipfs_uri(&cid))
}

/// Fetches the metadata behind an `ipfs://` URI.
#[instrument(skip(service))]
pub async fn fetch_metadata<S>(service: &S, uri: &str) -> Result<CertificateMetadata>
where
    S: PinningService + ?Sized,
{
    let cid = parse_ipfs_uri(uri)?;
    let bytes = service.fetch(&cid).await?;
    serde_json::from_slice(&bytes).map_err(|e| CertchainError::IpfsDownloadFailed {
        cid,
        reason: format!("not certificate metadata: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pin_metadata_rejects_invalid() {
        let ipfs = MemoryPinningService::new();
        let meta = CertificateMetadata::new("", "Ferris", "Crab University");
        assert!(matches!(
            pin_metadata(&ipfs, &meta).await,
            Err(CertchainError::ValidationError(_))
        ));
        assert!(ipfs.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_metadata_not_metadata() {
        let ipfs = MemoryPinningService::new();
        let cid = ipfs.pin_json(&json!([1, 2, 3]), "numbers").await.unwrap();
        let err = fetch_metadata(&ipfs, &ipfs_uri(&cid)).await.unwrap_err();
        assert!(matches!(err, CertchainError::IpfsDownloadFailed { .. }));
    }

    #[tokio::test]
    async fn test_metadata_with_document() {
        let ipfs = MemoryPinningService::new();
        let doc = ipfs.pin_file(b"%PDF".to_vec(), "cert.pdf").await.unwrap();
        let meta = CertificateMetadata::new("Rust 101", "Ferris", "Crab University")
            .with_document(doc.clone());
        let uri = pin_metadata(&ipfs, &meta).await.unwrap();
        let fetched = fetch_metadata(&ipfs, &uri).await.unwrap();
        assert_eq!(fetched.document_cid.as_deref(), Some(doc.as_str()));
    }
}

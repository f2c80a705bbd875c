//! CID validation and `ipfs://` URIs.

use certchain_core::constants::IPFS_URI_SCHEME;
use certchain_core::error::{CertchainError, Result};

/// Length of a base58 CIDv0 (`Qm…`).
const CID_V0_LEN: usize = 46;
/// Shortest base32 CIDv1 we accept (`baf…`).
const CID_V1_MIN_LEN: usize = 50;

/// Checks that `cid` looks like a CIDv0 or base32 CIDv1.
pub fn validate_cid(cid: &str) -> Result<()> {
    if cid.is_empty() {
        return Err(CertchainError::InvalidIpfsCid("CID cannot be empty".into()));
    }
    if !cid.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CertchainError::InvalidIpfsCid(
            "CID contains invalid characters".into(),
        ));
    }

    if cid.starts_with("Qm") {
        if cid.len() != CID_V0_LEN {
            return Err(CertchainError::InvalidIpfsCid(format!(
                "Invalid CIDv0 length: expected {}, got {}",
                CID_V0_LEN,
                cid.len()
            )));
        }
    } else if cid.starts_with("baf") {
        if cid.len() < CID_V1_MIN_LEN {
            return Err(CertchainError::InvalidIpfsCid(format!(
                "CIDv1 too short: {}",
                cid.len()
            )));
        }
    } else {
        return Err(CertchainError::InvalidIpfsCid(format!(
            "Unrecognized CID format: {}",
            cid
        )));
    }

    Ok(())
}

/// Builds `ipfs://<cid>`.
pub fn ipfs_uri(cid: &str) -> String {
    format!("{}{}", IPFS_URI_SCHEME, cid)
}

/// Extracts and validates the CID of an `ipfs://` URI.
///
/// Accepts the `ipfs://ipfs/<cid>` variant some tools produce and ignores
/// a trailing path.
pub fn parse_ipfs_uri(uri: &str) -> Result<String> {
    let rest = uri
        .trim()
        .strip_prefix(IPFS_URI_SCHEME)
        .ok_or_else(|| CertchainError::InvalidIpfsCid(format!("not an ipfs:// URI: {}", uri)))?;
    let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);
    let cid = rest.split('/').next().unwrap_or(rest);
    validate_cid(cid)?;
    Ok(cid.to_string())
}

//! Certificate records and their off-chain metadata.
//!
//! A [`Certificate`] is what the registry stores on-chain. Anything richer
//! than the recipient's name lives in a [`CertificateMetadata`] document
//! pinned to IPFS and linked through `metadata_uri`.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{IPFS_URI_SCHEME, MAX_METADATA_URI_LEN, MAX_RECIPIENT_NAME_LEN};
use crate::error::{CertchainError, Result};

/// Identifier assigned by the registry (auto-incrementing, starting at 1).
pub type CertificateId = u64;

/// An on-chain certificate record.
///
/// Lifecycle: nonexistent → active (issue) → revoked (revoke). Revocation
/// is final.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Registry-assigned id
    pub id: CertificateId,
    /// Name of the credential holder
    pub recipient_name: String,
    /// Unix timestamp (seconds) of issuance
    pub issue_date: u64,
    /// False once revoked
    pub is_valid: bool,
    /// Optional link to pinned metadata (`ipfs://<cid>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_uri: Option<String>,
}

impl Certificate {
    /// Creates an active certificate.
    pub fn new(id: CertificateId, recipient_name: impl Into<String>, issue_date: u64) -> Self {
        Self {
            id,
            recipient_name: recipient_name.into(),
            issue_date,
            is_valid: true,
            metadata_uri: None,
        }
    }

    /// Attaches a metadata URI.
    pub fn with_metadata_uri(mut self, uri: impl Into<String>) -> Self {
        self.metadata_uri = Some(uri.into());
        self
    }

    /// Issue date as a UTC datetime, if representable.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.issue_date).ok()?;
        Utc.timestamp_opt(secs, 0).single()
    }

    /// IPFS CID referenced by `metadata_uri`, if it is an `ipfs://` URI.
    pub fn metadata_cid(&self) -> Option<&str> {
        self.metadata_uri
            .as_deref()
            .and_then(|uri| uri.strip_prefix(IPFS_URI_SCHEME))
            .filter(|cid| !cid.is_empty())
    }
}

/// Validates a recipient name the way the registry does.
pub fn validate_recipient_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CertchainError::InvalidRecipientName("name is empty".into()));
    }
    if name.len() > MAX_RECIPIENT_NAME_LEN {
        return Err(CertchainError::InvalidRecipientName(format!(
            "name exceeds {} bytes",
            MAX_RECIPIENT_NAME_LEN
        )));
    }
    Ok(())
}

/// Validates a metadata URI the way the registry does.
pub fn validate_metadata_uri(uri: &str) -> Result<()> {
    if uri.trim().is_empty() {
        return Err(CertchainError::InvalidMetadataUri("uri is empty".into()));
    }
    if uri.len() > MAX_METADATA_URI_LEN {
        return Err(CertchainError::InvalidMetadataUri(format!(
            "uri exceeds {} bytes",
            MAX_METADATA_URI_LEN
        )));
    }
    Ok(())
}

/// A key/value attribute in certificate metadata (NFT-metadata style).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    /// Attribute name
    pub trait_type: String,
    /// Attribute value
    pub value: String,
}

/// Off-chain certificate metadata, pinned to IPFS as JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    /// Title of the certificate (e.g. course or award name)
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Credential holder
    pub recipient: String,
    /// Issuing organisation
    pub issuer: String,
    /// ISO-8601 issue date
    pub issue_date: String,
    /// CID of the pinned certificate document (PDF, image)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_cid: Option<String>,
    /// Extra attributes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<MetadataAttribute>,
}

impl CertificateMetadata {
    /// Creates metadata dated now.
    pub fn new(
        name: impl Into<String>,
        recipient: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            recipient: recipient.into(),
            issuer: issuer.into(),
            issue_date: Utc::now().to_rfc3339(),
            document_cid: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Links a pinned document.
    pub fn with_document(mut self, cid: impl Into<String>) -> Self {
        self.document_cid = Some(cid.into());
        self
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(MetadataAttribute {
            trait_type: trait_type.into(),
            value: value.into(),
        });
        self
    }

    /// Checks required fields.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CertchainError::ValidationError("metadata name is required".into()));
        }
        if self.issuer.trim().is_empty() {
            return Err(CertchainError::ValidationError("metadata issuer is required".into()));
        }
        validate_recipient_name(&self.recipient)
    }
}

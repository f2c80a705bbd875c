//! The registry contract interface as ABI calldata.
//!
//! [`RegistryCall`] is shared by both ends: the client encodes calls with
//! it and the local chain decodes and dispatches them. Return values use the
//! `encode_*` / `decode_*` helpers below.

use crate::abi::{self, ParamType, Token};
use crate::constants::SELECTOR_SIZE;
use crate::error::{CertchainError, Result};
use crate::types::{Address, Certificate, CertificateId};

const SIG_ISSUE: &str = "issueCertificate(string)";
const SIG_ISSUE_WITH_METADATA: &str = "issueCertificateWithMetadata(string,string)";
const SIG_VERIFY: &str = "verifyCertificate(uint256)";
const SIG_REVOKE: &str = "revokeCertificate(uint256)";
const SIG_TRANSFER: &str = "transferCertificate(uint256,string)";
const SIG_GET: &str = "getCertificate(uint256)";
const SIG_SET_GAS_LIMIT: &str = "setGasLimit(uint256)";
const SIG_GAS_LIMIT: &str = "gasLimit()";
const SIG_OWNER: &str = "owner()";
const SIG_COUNT: &str = "certificateCount()";
const SIG_TRANSFER_OWNERSHIP: &str = "transferOwnership(address)";

const ALL_SIGNATURES: [&str; 11] = [
    SIG_ISSUE,
    SIG_ISSUE_WITH_METADATA,
    SIG_VERIFY,
    SIG_REVOKE,
    SIG_TRANSFER,
    SIG_GET,
    SIG_SET_GAS_LIMIT,
    SIG_GAS_LIMIT,
    SIG_OWNER,
    SIG_COUNT,
    SIG_TRANSFER_OWNERSHIP,
];

const CERTIFICATE_TUPLE: [ParamType; 5] = [
    ParamType::Uint,
    ParamType::String,
    ParamType::Uint,
    ParamType::Bool,
    ParamType::String,
];

/// A call into the certificate registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryCall {
    /// `issueCertificate(string)`
    IssueCertificate {
        /// Recipient name
        recipient_name: String,
    },
    /// `issueCertificateWithMetadata(string,string)`
    IssueCertificateWithMetadata {
        /// Recipient name
        recipient_name: String,
        /// Metadata link, usually `ipfs://<cid>`
        metadata_uri: String,
    },
    /// `verifyCertificate(uint256)`
    VerifyCertificate {
        /// Certificate id
        id: CertificateId,
    },
    /// `revokeCertificate(uint256)`
    RevokeCertificate {
        /// Certificate id
        id: CertificateId,
    },
    /// `transferCertificate(uint256,string)`
    TransferCertificate {
        /// Certificate id
        id: CertificateId,
        /// New recipient name
        new_recipient_name: String,
    },
    /// `getCertificate(uint256)`
    GetCertificate {
        /// Certificate id
        id: CertificateId,
    },
    /// `setGasLimit(uint256)`
    SetGasLimit {
        /// New threshold
        limit: u64,
    },
    /// `gasLimit()`
    GasLimit,
    /// `owner()`
    Owner,
    /// `certificateCount()`
    CertificateCount,
    /// `transferOwnership(address)`
    TransferOwnership {
        /// New owner
        new_owner: Address,
    },
}

impl RegistryCall {
    /// Solidity function signature.
    pub fn signature(&self) -> &'static str {
        match self {
            RegistryCall::IssueCertificate { .. } => SIG_ISSUE,
            RegistryCall::IssueCertificateWithMetadata { .. } => SIG_ISSUE_WITH_METADATA,
            RegistryCall::VerifyCertificate { .. } => SIG_VERIFY,
            RegistryCall::RevokeCertificate { .. } => SIG_REVOKE,
            RegistryCall::TransferCertificate { .. } => SIG_TRANSFER,
            RegistryCall::GetCertificate { .. } => SIG_GET,
            RegistryCall::SetGasLimit { .. } => SIG_SET_GAS_LIMIT,
            RegistryCall::GasLimit => SIG_GAS_LIMIT,
            RegistryCall::Owner => SIG_OWNER,
            RegistryCall::CertificateCount => SIG_COUNT,
            RegistryCall::TransferOwnership { .. } => SIG_TRANSFER_OWNERSHIP,
        }
    }

    /// Function name without parameters.
    pub fn name(&self) -> &'static str {
        let sig = self.signature();
        sig.split('(').next().unwrap_or(sig)
    }

    /// True for calls that never modify state.
    pub fn is_view(&self) -> bool {
        matches!(
            self,
            RegistryCall::GetCertificate { .. }
                | RegistryCall::GasLimit
                | RegistryCall::Owner
                | RegistryCall::CertificateCount
        )
    }

    fn args(&self) -> Vec<Token> {
        match self {
            RegistryCall::IssueCertificate { recipient_name } => {
                vec![Token::String(recipient_name.clone())]
            }
            RegistryCall::IssueCertificateWithMetadata {
                recipient_name,
                metadata_uri,
            } => vec![
                Token::String(recipient_name.clone()),
                Token::String(metadata_uri.clone()),
            ],
            RegistryCall::VerifyCertificate { id }
            | RegistryCall::RevokeCertificate { id }
            | RegistryCall::GetCertificate { id } => vec![Token::Uint(*id)],
            RegistryCall::TransferCertificate {
                id,
                new_recipient_name,
            } => vec![Token::Uint(*id), Token::String(new_recipient_name.clone())],
            RegistryCall::SetGasLimit { limit } => vec![Token::Uint(*limit)],
            RegistryCall::GasLimit | RegistryCall::Owner | RegistryCall::CertificateCount => {
                Vec::new()
            }
            RegistryCall::TransferOwnership { new_owner } => vec![Token::Address(*new_owner)],
        }
    }

    /// Encodes the call as calldata.
    pub fn encode(&self) -> Vec<u8> {
        abi::encode_call(self.signature(), &self.args())
    }

    /// Decodes calldata.
    pub fn decode(calldata: &[u8]) -> Result<Self> {
        if calldata.len() < SELECTOR_SIZE {
            return Err(CertchainError::AbiDecode(format!(
                "calldata too short: {} bytes",
                calldata.len()
            )));
        }
        let (selector, body) = calldata.split_at(SELECTOR_SIZE);
        let signature = ALL_SIGNATURES
            .iter()
            .copied()
            .find(|sig| abi::selector(sig) == selector)
            .ok_or_else(|| CertchainError::UnknownSelector(hex::encode(selector)))?;

        let call = match signature {
            SIG_ISSUE => {
                let mut t = abi::decode(&[ParamType::String], body)?.into_iter();
                RegistryCall::IssueCertificate {
                    recipient_name: take_string(&mut t)?,
                }
            }
            SIG_ISSUE_WITH_METADATA => {
                let mut t = abi::decode(&[ParamType::String, ParamType::String], body)?.into_iter();
                RegistryCall::IssueCertificateWithMetadata {
                    recipient_name: take_string(&mut t)?,
                    metadata_uri: take_string(&mut t)?,
                }
            }
            SIG_VERIFY => RegistryCall::VerifyCertificate {
                id: decode_uint(body)?,
            },
            SIG_REVOKE => RegistryCall::RevokeCertificate {
                id: decode_uint(body)?,
            },
            SIG_TRANSFER => {
                let mut t = abi::decode(&[ParamType::Uint, ParamType::String], body)?.into_iter();
                RegistryCall::TransferCertificate {
                    id: take_uint(&mut t)?,
                    new_recipient_name: take_string(&mut t)?,
                }
            }
            SIG_GET => RegistryCall::GetCertificate {
                id: decode_uint(body)?,
            },
            SIG_SET_GAS_LIMIT => RegistryCall::SetGasLimit {
                limit: decode_uint(body)?,
            },
            SIG_GAS_LIMIT => RegistryCall::GasLimit,
            SIG_OWNER => RegistryCall::Owner,
            SIG_COUNT => RegistryCall::CertificateCount,
            SIG_TRANSFER_OWNERSHIP => RegistryCall::TransferOwnership {
                new_owner: decode_address(body)?,
            },
            other => {
                return Err(CertchainError::InternalError(format!(
                    "selector table out of sync for {}",
                    other
                )))
            }
        };
        Ok(call)
    }
}

fn take_uint(tokens: &mut impl Iterator<Item = Token>) -> Result<u64> {
    tokens
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| CertchainError::AbiDecode("expected uint256".into()))
}

fn take_string(tokens: &mut impl Iterator<Item = Token>) -> Result<String> {
    tokens
        .next()
        .and_then(Token::into_string)
        .ok_or_else(|| CertchainError::AbiDecode("expected string".into()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// RETURN VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// Encodes a `uint256` return value.
pub fn encode_uint(value: u64) -> Vec<u8> {
    abi::encode(&[Token::Uint(value)])
}

/// Encodes a `bool` return value.
pub fn encode_bool(value: bool) -> Vec<u8> {
    abi::encode(&[Token::Bool(value)])
}

/// Encodes an `address` return value.
pub fn encode_address(value: &Address) -> Vec<u8> {
    abi::encode(&[Token::Address(*value)])
}

/// Encodes a certificate as `(uint256,string,uint256,bool,string)`.
///
/// A missing metadata URI is encoded as the empty string.
pub fn encode_certificate(cert: &Certificate) -> Vec<u8> {
    abi::encode(&[
        Token::Uint(cert.id),
        Token::String(cert.recipient_name.clone()),
        Token::Uint(cert.issue_date),
        Token::Bool(cert.is_valid),
        Token::String(cert.metadata_uri.clone().unwrap_or_default()),
    ])
}

/// Decodes a `uint256` return value.
pub fn decode_uint(data: &[u8]) -> Result<u64> {
    take_uint(&mut abi::decode(&[ParamType::Uint], data)?.into_iter())
}

/// Decodes a `bool` return value.
pub fn decode_bool(data: &[u8]) -> Result<bool> {
    abi::decode(&[ParamType::Bool], data)?
        .pop()
        .and_then(Token::into_bool)
        .ok_or_else(|| CertchainError::AbiDecode("expected bool".into()))
}

/// Decodes an `address` return value.
pub fn decode_address(data: &[u8]) -> Result<Address> {
    abi::decode(&[ParamType::Address], data)?
        .pop()
        .and_then(Token::into_address)
        .ok_or_else(|| CertchainError::AbiDecode("expected address".into()))
}

/// Decodes a certificate tuple.
pub fn decode_certificate(data: &[u8]) -> Result<Certificate> {
    let mut t = abi::decode(&CERTIFICATE_TUPLE, data)?.into_iter();
    let id = take_uint(&mut t)?;
    let recipient_name = take_string(&mut t)?;
    let issue_date = take_uint(&mut t)?;
    let is_valid = t
        .next()
        .and_then(Token::into_bool)
        .ok_or_else(|| CertchainError::AbiDecode("expected bool".into()))?;
    let metadata_uri = take_string(&mut t)?;

    Ok(Certificate {
        id,
        recipient_name,
        issue_date,
        is_valid,
        metadata_uri: Some(metadata_uri).filter(|uri| !uri.is_empty()),
    })
}

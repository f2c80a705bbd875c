//! Registry events and their raw log encoding.
//!
//! Events are emitted as Ethereum logs: `topics[0]` is the keccak-256 hash
//! of the event signature, indexed parameters follow as topics and the
//! remaining parameters are ABI-encoded into `data`.

use serde::{Deserialize, Serialize};

use crate::abi::{self, address_word, keccak256, uint_word, ParamType, Token};
use crate::constants::{GAS_LOG, GAS_LOG_DATA_BYTE, GAS_LOG_TOPIC};
use crate::error::{CertchainError, Result};
use crate::types::hexutil;
use crate::types::{Address, CertificateId, TxHash};

const SIG_ISSUED: &str = "CertificateIssued(uint256,string,uint256)";
const SIG_VERIFIED: &str = "CertificateVerified(uint256,bool)";
const SIG_REVOKED: &str = "CertificateRevoked(uint256)";
const SIG_TRANSFERRED: &str = "CertificateTransferred(uint256,string,string)";
const SIG_GAS_LIMIT: &str = "GasLimitUpdated(uint256,uint256)";
const SIG_OWNERSHIP: &str = "OwnershipTransferred(address,address)";

/// A log as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Emitting contract
    pub address: Address,
    /// Event signature hash followed by indexed parameters
    #[serde(with = "hexutil::words")]
    pub topics: Vec<[u8; 32]>,
    /// ABI-encoded non-indexed parameters
    #[serde(with = "hexutil::bytes")]
    pub data: Vec<u8>,
    /// Block the log was mined in
    #[serde(default, with = "hexutil::quantity_opt", skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Transaction that produced the log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<TxHash>,
}

impl RawLog {
    /// Gas charged for emitting this log.
    pub fn gas_cost(&self) -> u64 {
        GAS_LOG + GAS_LOG_TOPIC * self.topics.len() as u64 + GAS_LOG_DATA_BYTE * self.data.len() as u64
    }
}

/// Events emitted by the certificate registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum ContractEvent {
    /// A certificate was issued.
    CertificateIssued {
        /// New certificate id (indexed)
        id: CertificateId,
        /// Recipient name
        recipient_name: String,
        /// Unix timestamp of issuance
        issue_date: u64,
    },
    /// A certificate was checked on-chain.
    CertificateVerified {
        /// Certificate id (indexed)
        id: CertificateId,
        /// Validity at verification time
        is_valid: bool,
    },
    /// A certificate was revoked.
    CertificateRevoked {
        /// Certificate id (indexed)
        id: CertificateId,
    },
    /// A certificate was reassigned to a new recipient.
    CertificateTransferred {
        /// Certificate id (indexed)
        id: CertificateId,
        /// Recipient before the transfer
        previous_recipient: String,
        /// Recipient after the transfer
        new_recipient: String,
    },
    /// The owner changed the gas threshold.
    GasLimitUpdated {
        /// Previous threshold
        old_limit: u64,
        /// New threshold
        new_limit: u64,
    },
    /// Registry ownership moved.
    OwnershipTransferred {
        /// Previous owner (indexed)
        previous_owner: Address,
        /// New owner (indexed)
        new_owner: Address,
    },
}

impl ContractEvent {
    /// Solidity event signature.
    pub fn signature(&self) -> &'static str {
        match self {
            ContractEvent::CertificateIssued { .. } => SIG_ISSUED,
            ContractEvent::CertificateVerified { .. } => SIG_VERIFIED,
            ContractEvent::CertificateRevoked { .. } => SIG_REVOKED,
            ContractEvent::CertificateTransferred { .. } => SIG_TRANSFERRED,
            ContractEvent::GasLimitUpdated { .. } => SIG_GAS_LIMIT,
            ContractEvent::OwnershipTransferred { .. } => SIG_OWNERSHIP,
        }
    }

    /// Event name without parameters.
    pub fn name(&self) -> &'static str {
        let sig = self.signature();
        sig.split('(').next().unwrap_or(sig)
    }

    /// `topics[0]` for this event.
    pub fn topic0(&self) -> [u8; 32] {
        keccak256(self.signature())
    }

    /// Certificate the event refers to, if any.
    pub fn certificate_id(&self) -> Option<CertificateId> {
        match self {
            ContractEvent::CertificateIssued { id, .. }
            | ContractEvent::CertificateVerified { id, .. }
            | ContractEvent::CertificateRevoked { id }
            | ContractEvent::CertificateTransferred { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Encodes the event as a log emitted by `address`.
    pub fn to_log(&self, address: Address) -> RawLog {
        let mut topics = vec![self.topic0()];
        let data = match self {
            ContractEvent::CertificateIssued {
                id,
                recipient_name,
                issue_date,
            } => {
                topics.push(uint_word(*id));
                abi::encode(&[Token::String(recipient_name.clone()), Token::Uint(*issue_date)])
            }
            ContractEvent::CertificateVerified { id, is_valid } => {
                topics.push(uint_word(*id));
                abi::encode(&[Token::Bool(*is_valid)])
            }
            ContractEvent::CertificateRevoked { id } => {
                topics.push(uint_word(*id));
                Vec::new()
            }
            ContractEvent::CertificateTransferred {
                id,
                previous_recipient,
                new_recipient,
            } => {
                topics.push(uint_word(*id));
                abi::encode(&[
                    Token::String(previous_recipient.clone()),
                    Token::String(new_recipient.clone()),
                ])
            }
            ContractEvent::GasLimitUpdated {
                old_limit,
                new_limit,
            } => abi::encode(&[Token::Uint(*old_limit), Token::Uint(*new_limit)]),
            ContractEvent::OwnershipTransferred {
                previous_owner,
                new_owner,
            } => {
                topics.push(address_word(previous_owner));
                topics.push(address_word(new_owner));
                Vec::new()
            }
        };

        RawLog {
            address,
            topics,
            data,
            block_number: None,
            transaction_hash: None,
        }
    }

    /// Decodes a registry log.
    pub fn from_log(log: &RawLog) -> Result<Self> {
        let topic0 = log
            .topics
            .first()
            .ok_or_else(|| CertchainError::AbiDecode("log has no topics".into()))?;

        let indexed_uint = |index: usize| -> Result<u64> {
            let topic = topic_at(log, index)?;
            abi::decode(&[ParamType::Uint], topic)?
                .pop()
                .and_then(Token::into_uint)
                .ok_or_else(|| CertchainError::AbiDecode("bad indexed uint".into()))
        };
        let indexed_address = |index: usize| -> Result<Address> {
            let topic = topic_at(log, index)?;
            abi::decode(&[ParamType::Address], topic)?
                .pop()
                .and_then(Token::into_address)
                .ok_or_else(|| CertchainError::AbiDecode("bad indexed address".into()))
        };

        if *topic0 == keccak256(SIG_ISSUED) {
            let mut data = abi::decode(&[ParamType::String, ParamType::Uint], &log.data)?.into_iter();
            Ok(ContractEvent::CertificateIssued {
                id: indexed_uint(1)?,
                recipient_name: next_string(&mut data)?,
                issue_date: next_uint(&mut data)?,
            })
        } else if *topic0 == keccak256(SIG_VERIFIED) {
            let mut data = abi::decode(&[ParamType::Bool], &log.data)?.into_iter();
            Ok(ContractEvent::CertificateVerified {
                id: indexed_uint(1)?,
                is_valid: data
                    .next()
                    .and_then(Token::into_bool)
                    .ok_or_else(|| CertchainError::AbiDecode("missing bool".into()))?,
            })
        } else if *topic0 == keccak256(SIG_REVOKED) {
            Ok(ContractEvent::CertificateRevoked { id: indexed_uint(1)? })
        } else if *topic0 == keccak256(SIG_TRANSFERRED) {
            let mut data =
                abi::decode(&[ParamType::String, ParamType::String], &log.data)?.into_iter();
            Ok(ContractEvent::CertificateTransferred {
                id: indexed_uint(1)?,
                previous_recipient: next_string(&mut data)?,
                new_recipient: next_string(&mut data)?,
            })
        } else if *topic0 == keccak256(SIG_GAS_LIMIT) {
            let mut data = abi::decode(&[ParamType::Uint, ParamType::Uint], &log.data)?.into_iter();
            Ok(ContractEvent::GasLimitUpdated {
                old_limit: next_uint(&mut data)?,
                new_limit: next_uint(&mut data)?,
            })
        } else if *topic0 == keccak256(SIG_OWNERSHIP) {
            Ok(ContractEvent::OwnershipTransferred {
                previous_owner: indexed_address(1)?,
                new_owner: indexed_address(2)?,
            })
        } else {
            Err(CertchainError::AbiDecode(format!(
                "unknown event topic 0x{}",
                hex::encode(topic0)
            )))
        }
    }
}

fn topic_at(log: &RawLog, index: usize) -> Result<&[u8]> {
    log.topics
        .get(index)
        .map(|t| &t[..])
        .ok_or_else(|| CertchainError::AbiDecode(format!("missing topic {}", index)))
}

fn next_uint(tokens: &mut impl Iterator<Item = Token>) -> Result<u64> {
    tokens
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| CertchainError::AbiDecode("missing uint".into()))
}

fn next_string(tokens: &mut impl Iterator<Item = Token>) -> Result<String> {
    tokens
        .next()
        .and_then(Token::into_string)
        .ok_or_else(|| CertchainError::AbiDecode("missing string".into()))
}

/// A decoded event with its position in the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Block the event was mined in
    pub block_number: u64,
    /// Transaction that emitted it
    pub transaction_hash: TxHash,
    /// The event
    #[serde(flatten)]
    pub event: ContractEvent,
}

impl LogEntry {
    /// Decodes a mined log. Fails if position fields are missing.
    pub fn from_raw(log: &RawLog) -> Result<Self> {
        let block_number = log
            .block_number
            .ok_or_else(|| CertchainError::ValidationError("log has no block number".into()))?;
        let transaction_hash = log
            .transaction_hash
            .ok_or_else(|| CertchainError::ValidationError("log has no transaction hash".into()))?;
        Ok(Self {
            block_number,
            transaction_hash,
            event: ContractEvent::from_log(log)?,
        })
    }
}

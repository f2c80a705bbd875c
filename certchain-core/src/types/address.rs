//! Account addresses and transaction hashes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::abi::keccak256;
use crate::constants::{ADDRESS_SIZE, HASH_SIZE};
use crate::error::{CertchainError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A 20-byte account or contract address.
///
/// Parses from hex with or without `0x` in any letter case and always
/// formats with the EIP-55 mixed-case checksum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address {
    bytes: [u8; ADDRESS_SIZE],
}

impl Address {
    /// Creates an address from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ADDRESS_SIZE {
            return Err(CertchainError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_SIZE,
                bytes.len()
            )));
        }

        let mut arr = [0u8; ADDRESS_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates from a fixed-size array.
    pub const fn from_array(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the EIP-55 checksummed hex string.
    pub fn to_checksum_string(&self) -> String {
        let lower = hex::encode(self.bytes);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Parses from hex string (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if s.len() != ADDRESS_SIZE * 2 {
            return Err(CertchainError::InvalidAddress(format!(
                "expected {} hex characters, got {}",
                ADDRESS_SIZE * 2,
                s.len()
            )));
        }
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }

    /// Returns the zero address.
    pub const fn zero() -> Self {
        Self {
            bytes: [0u8; ADDRESS_SIZE],
        }
    }

    /// Returns true if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// Deterministic development account `index`.
    ///
    /// The local chain pre-funds these; index 0 deploys and owns the registry.
    pub fn dev_account(index: usize) -> Self {
        let hash = keccak256(format!("certchain-dev-account-{}", index));
        let mut arr = [0u8; ADDRESS_SIZE];
        arr.copy_from_slice(&hash[HASH_SIZE - ADDRESS_SIZE..]);
        Self { bytes: arr }
    }

    /// Address of the contract deployed by `deployer` with `nonce`.
    ///
    /// Simplified CREATE derivation (keccak of deployer || nonce) that is
    /// stable across runs of the local chain.
    pub fn contract_address(deployer: &Address, nonce: u64) -> Self {
        let mut preimage = deployer.bytes.to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        let hash = keccak256(&preimage);
        let mut arr = [0u8; ADDRESS_SIZE];
        arr.copy_from_slice(&hash[HASH_SIZE - ADDRESS_SIZE..]);
        Self { bytes: arr }
    }
}

impl FromStr for Address {
    type Err = CertchainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum_string())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION HASH
// ═══════════════════════════════════════════════════════════════════════════════

/// A 32-byte transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TxHash {
    bytes: [u8; HASH_SIZE],
}

impl TxHash {
    /// Creates from a fixed-size array.
    pub const fn from_array(bytes: [u8; HASH_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the `0x`-prefixed lowercase hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Parses from hex string (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH_SIZE {
            return Err(CertchainError::ValidationError(format!(
                "transaction hash must be {} bytes, got {}",
                HASH_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; HASH_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self { bytes: arr })
    }
}

impl FromStr for TxHash {
    type Err = CertchainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.to_hex())
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TxHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

//! Minimal Solidity ABI codec.
//!
//! Covers the value types the registry interface uses: `uint256` (bounded
//! to `u64`), `bool`, `address` and `string`. Encoding follows the standard
//! head/tail layout; decoding validates every offset against the payload
//! and never panics on malformed input.

use sha3::{Digest, Keccak256};

use crate::constants::{ABI_WORD_SIZE, REVERT_SELECTOR, SELECTOR_SIZE};
use crate::error::{CertchainError, Result};
use crate::types::Address;

/// An ABI value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// `uint256` restricted to values that fit in a `u64`
    Uint(u64),
    /// `bool`
    Bool(bool),
    /// `address`
    Address(Address),
    /// `string`
    String(String),
}

/// The ABI type of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// `uint256`
    Uint,
    /// `bool`
    Bool,
    /// `address`
    Address,
    /// `string`
    String,
}

impl Token {
    /// Returns the contained integer, if any.
    pub fn into_uint(self) -> Option<u64> {
        match self {
            Token::Uint(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the contained bool, if any.
    pub fn into_bool(self) -> Option<bool> {
        match self {
            Token::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the contained address, if any.
    pub fn into_address(self) -> Option<Address> {
        match self {
            Token::Address(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the contained string, if any.
    pub fn into_string(self) -> Option<String> {
        match self {
            Token::String(v) => Some(v),
            _ => None,
        }
    }
}

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}

/// Function selector: first four bytes of the signature hash.
pub fn selector(signature: &str) -> [u8; SELECTOR_SIZE] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encodes a `u64` as a big-endian ABI word.
pub fn uint_word(value: u64) -> [u8; ABI_WORD_SIZE] {
    let mut word = [0u8; ABI_WORD_SIZE];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encodes an address as a left-padded ABI word.
pub fn address_word(address: &Address) -> [u8; ABI_WORD_SIZE] {
    let mut word = [0u8; ABI_WORD_SIZE];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(ABI_WORD_SIZE) * ABI_WORD_SIZE
}

/// ABI-encodes a list of tokens as a tuple.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_size = tokens.len() * ABI_WORD_SIZE;
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Uint(v) => head.extend_from_slice(&uint_word(*v)),
            Token::Bool(b) => head.extend_from_slice(&uint_word(u64::from(*b))),
            Token::Address(a) => head.extend_from_slice(&address_word(a)),
            Token::String(s) => {
                head.extend_from_slice(&uint_word((head_size + tail.len()) as u64));
                let bytes = s.as_bytes();
                tail.extend_from_slice(&uint_word(bytes.len() as u64));
                tail.extend_from_slice(bytes);
                tail.resize(tail.len() + padded_len(bytes.len()) - bytes.len(), 0);
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Encodes a function call: selector followed by encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend_from_slice(&encode(args));
    out
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8]> {
    offset
        .checked_add(ABI_WORD_SIZE)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            CertchainError::AbiDecode(format!(
                "word at offset {} out of bounds (payload is {} bytes)",
                offset,
                data.len()
            ))
        })
}

fn word_to_u64(word: &[u8]) -> Result<u64> {
    if word[..24].iter().any(|&b| b != 0) {
        return Err(CertchainError::AbiDecode("integer exceeds u64".into()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(buf))
}

fn word_to_usize(word: &[u8]) -> Result<usize> {
    usize::try_from(word_to_u64(word)?)
        .map_err(|_| CertchainError::AbiDecode("offset exceeds usize".into()))
}

/// Decodes an ABI tuple of the given parameter types.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>> {
    let mut tokens = Vec::with_capacity(types.len());

    for (index, param) in types.iter().enumerate() {
        let word = word_at(data, index * ABI_WORD_SIZE)?;
        let token = match param {
            ParamType::Uint => Token::Uint(word_to_u64(word)?),
            ParamType::Bool => match word_to_u64(word)? {
                0 => Token::Bool(false),
                1 => Token::Bool(true),
                other => {
                    return Err(CertchainError::AbiDecode(format!(
                        "invalid bool value {}",
                        other
                    )))
                }
            },
            ParamType::Address => {
                if word[..12].iter().any(|&b| b != 0) {
                    return Err(CertchainError::AbiDecode("address has dirty padding".into()));
                }
                Token::Address(Address::from_bytes(&word[12..])?)
            }
            ParamType::String => {
                let offset = word_to_usize(word)?;
                let len = word_to_usize(word_at(data, offset)?)?;
                let start = offset + ABI_WORD_SIZE;
                let bytes = start
                    .checked_add(len)
                    .and_then(|end| data.get(start..end))
                    .ok_or_else(|| {
                        CertchainError::AbiDecode(format!(
                            "string of {} bytes at offset {} out of bounds",
                            len, offset
                        ))
                    })?;
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|e| CertchainError::AbiDecode(format!("invalid utf-8: {}", e)))?;
                Token::String(s)
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/// Encodes a Solidity `Error(string)` revert payload.
pub fn encode_revert(reason: &str) -> Vec<u8> {
    let mut out = REVERT_SELECTOR.to_vec();
    out.extend_from_slice(&encode(&[Token::String(reason.to_string())]));
    out
}

/// Decodes a Solidity `Error(string)` revert payload.
///
/// Returns `None` when the payload is not an `Error(string)`.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&REVERT_SELECTOR[..])?;
    decode(&[ParamType::String], body)
        .ok()?
        .pop()?
        .into_string()
}

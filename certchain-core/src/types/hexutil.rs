//! Ethereum JSON-RPC hex encodings.
//!
//! Quantities are `0x`-prefixed hex without leading zeros (`0x0` for zero);
//! data is `0x`-prefixed hex of the raw bytes.

use crate::error::{CertchainError, Result};

/// Encodes a quantity (`42` → `"0x2a"`).
pub fn encode_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Decodes a quantity. Accepts decimal strings as a courtesy to hand-written requests.
pub fn decode_quantity(s: &str) -> Result<u64> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some("") => return Err(CertchainError::ValidationError("empty quantity".into())),
        Some(hex_digits) => u64::from_str_radix(hex_digits, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| CertchainError::ValidationError(format!("invalid quantity '{}': {}", s, e)))
}

/// Encodes bytes as `0x`-prefixed hex.
pub fn encode_bytes(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decodes `0x`-prefixed (or bare) hex data.
pub fn decode_bytes(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(s)?)
}

/// Serde adapter for `u64` quantities.
pub mod quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a quantity.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_quantity(*value))
    }

    /// Deserializes a quantity from a hex string or a JSON number.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Str(s) => super::decode_quantity(&s).map_err(serde::de::Error::custom),
            Raw::Num(n) => Ok(n),
        }
    }
}

/// Serde adapter for optional `u64` quantities.
pub mod quantity_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes an optional quantity.
    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&super::encode_quantity(*v)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| super::decode_quantity(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Serde adapter for byte data.
pub mod bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes bytes as `0x` hex.
    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_bytes(value))
    }

    /// Deserializes `0x` hex into bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_bytes(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for lists of 32-byte words (log topics).
pub mod words {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes words as `0x` hex strings.
    pub fn serialize<S: Serializer>(value: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(value.iter().map(|w| super::encode_bytes(w)))
    }

    /// Deserializes `0x` hex strings into words.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error> {
        let raw: Vec<String> = Vec::deserialize(deserializer)?;
        raw.iter()
            .map(|s| {
                let bytes = super::decode_bytes(s).map_err(serde::de::Error::custom)?;
                <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
                    serde::de::Error::custom(format!("expected 32-byte word, got {} bytes", bytes.len()))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_encoding() {
        assert_eq!(encode_quantity(0), "0x0");
        assert_eq!(encode_quantity(31337), "0x7a69");
        assert_eq!(decode_quantity("0x7a69").unwrap(), 31337);
        assert_eq!(decode_quantity("31337").unwrap(), 31337);
        assert!(decode_quantity("0x").is_err());
        assert!(decode_quantity("0xzz").is_err());
    }

    #[test]
    fn test_bytes_encoding() {
        assert_eq!(encode_bytes(&[]), "0x");
        assert_eq!(decode_bytes("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_bytes("0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(decode_bytes("0xabc").is_err());
    }

    #[test]
    fn test_words_adapter() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Topics {
            #[serde(with = "words")]
            topics: Vec<[u8; 32]>,
        }

        let value = Topics { topics: vec![[0x11; 32]] };
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.contains(&format!("0x{}", "11".repeat(32))));
        assert_eq!(serde_json::from_str::<Topics>(&json).unwrap(), value);
        assert!(serde_json::from_str::<Topics>(r#"{"topics":["0x1234"]}"#).is_err());
    }
}

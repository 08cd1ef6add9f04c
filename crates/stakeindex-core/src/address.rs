//! Normalized account addresses and transaction hashes.
//!
//! Both are stored lowercase so that the same account always maps to the same
//! entity key regardless of how the event source checksums it.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ADDRESS_HEX_LEN: usize = 40;
const TX_HASH_HEX_LEN: usize = 64;

/// Validate `0x` + `expected_len` hex characters and return the lowercase form.
fn normalize_hex(field: &'static str, raw: &str, expected_len: usize) -> Result<String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"));

    match body {
        Some(hex) if hex.len() == expected_len && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            Ok(format!("0x{}", hex.to_ascii_lowercase()))
        }
        _ => Err(Error::InvalidHex {
            field,
            value: raw.to_string(),
            expected_len,
        }),
    }
}

/// A 20-byte account address in lowercase `0x` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// The zero address, used as the `from` of token mints.
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(ADDRESS_HEX_LEN)))
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        normalize_hex("address", s, ADDRESS_HEX_LEN).map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 32-byte transaction hash in lowercase `0x` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        normalize_hex("transaction hash", s, TX_HASH_HEX_LEN).map(Self)
    }
}

impl TryFrom<String> for TxHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TxHash> for String {
    fn from(value: TxHash) -> Self {
        value.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_lowercased() {
        let addr: Address = "0xAbCdEf0123456789aBcDeF0123456789ABCDEF01".parse().unwrap();
        assert_eq!(addr.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_address_rejects_bad_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("1234567890123456789012345678901234567890".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_rejects_non_hex() {
        let bad = format!("0x{}", "g".repeat(40));
        assert!(bad.parse::<Address>().is_err());
    }

    #[test]
    fn test_zero_address() {
        let zero = Address::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.as_str().len(), 42);

        let other: Address = format!("0x{}1", "0".repeat(39)).parse().unwrap();
        assert!(!other.is_zero());
    }

    #[test]
    fn test_tx_hash_roundtrip_json() {
        let raw = format!("\"0x{}\"", "AB".repeat(32));
        let hash: TxHash = serde_json::from_str(&raw).unwrap();
        assert_eq!(hash.as_str(), format!("0x{}", "ab".repeat(32)));
        assert_eq!(
            serde_json::to_string(&hash).unwrap(),
            format!("\"0x{}\"", "ab".repeat(32))
        );
    }

    #[test]
    fn test_tx_hash_rejects_address_length() {
        let raw = format!("\"0x{}\"", "a".repeat(40));
        assert!(serde_json::from_str::<TxHash>(&raw).is_err());
    }
}

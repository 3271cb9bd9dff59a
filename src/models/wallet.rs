use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Zero address, used as the token address of the native asset
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// A 20-byte EVM account, stored lowercase with a `0x` prefix.
///
/// Two spellings of the same account (checksummed, upper case, without
/// prefix) compare equal once parsed, so the type is safe to use as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(address: &str) -> Result<Self, ValidationError> {
        let hex = strip_hex_prefix(address.trim());

        if hex.len() != 40 {
            return Err(ValidationError::InvalidAddress(format!(
                "{}: expected 40 hex characters, got {}",
                address,
                hex.len()
            )));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidAddress(format!(
                "{}: contains non-hexadecimal characters",
                address
            )));
        }

        Ok(Self(format!("0x{}", hex.to_lowercase())))
    }

    /// Extract the address held in the low 20 bytes of a 32-byte log topic
    pub fn from_topic(topic: &str) -> Result<Self, ValidationError> {
        let hex = strip_hex_prefix(topic.trim());
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidAddress(format!(
                "topic {}: expected 64 hex characters",
                topic
            )));
        }
        Self::parse(&hex[24..])
    }

    pub fn zero() -> Self {
        Self(ZERO_ADDRESS.to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_ADDRESS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Address> for WalletAddress {
    fn from(address: Address) -> Self {
        Self(format!("0x{}", hex::encode(address)))
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

/// Opaque subscriber identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32-byte transaction hash, lowercase with a `0x` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionHash(String);

impl TransactionHash {
    pub fn parse(hash: &str) -> Result<Self, ValidationError> {
        let hex = strip_hex_prefix(hash.trim());
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidTransactionHash(hash.to_string()));
        }
        Ok(Self(format!("0x{}", hex.to_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TransactionHash {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TransactionHash> for String {
    fn from(hash: TransactionHash) -> Self {
        hash.0
    }
}

/// Strip a `0x` / `0X` prefix if present
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

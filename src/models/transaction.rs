use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use super::wallet::{TransactionHash, UserId, WalletAddress};

/// Log index reserved for the native-currency transfer of a transaction
pub const NATIVE_LOG_INDEX: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transfer {
    pub tx_hash: TransactionHash,
    pub from: WalletAddress,
    pub to: WalletAddress,
    #[serde(with = "json_integer")]
    pub value: BigUint,
    pub token_symbol: String,
    pub token_address: WalletAddress,
    pub log_index: i64,
}

impl Transfer {
    pub fn is_native(&self) -> bool {
        self.log_index == NATIVE_LOG_INDEX
    }

    pub fn involves(&self, address: &WalletAddress) -> bool {
        &self.from == address || &self.to == address
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub hash: TransactionHash,
    pub from: WalletAddress,
    /// `None` for contract creation, written as `""`
    #[serde(with = "empty_address")]
    pub to: Option<WalletAddress>,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub gas_used: u64,
    #[serde(with = "json_integer")]
    pub gas_price: BigUint,
    /// Every transfer extracted from the transaction
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletNotification {
    pub wallet_address: WalletAddress,
    pub transaction: Transaction,
    /// Only the transfers involving `wallet_address`
    pub transfers: Vec<Transfer>,
    pub subscribers: Vec<UserId>,
    pub timestamp: DateTime<Utc>,
}

/// Arbitrary-precision integers as bare JSON numbers.
///
/// Relies on serde_json's `arbitrary_precision` feature so values wider than
/// 64 bits keep every digit.
pub mod json_integer {
    use num_bigint::BigUint;
    use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Number;
    use std::str::FromStr;

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let number = Number::from_str(&value.to_str_radix(10)).map_err(ser::Error::custom)?;
        number.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let number = Number::deserialize(deserializer)?;
        let raw = number.to_string();
        BigUint::parse_bytes(raw.as_bytes(), 10)
            .ok_or_else(|| de::Error::custom(format!("invalid unsigned integer: {}", raw)))
    }
}

/// Optional address where absence is the empty string
pub mod empty_address {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::models::WalletAddress;

    pub fn serialize<S>(value: &Option<WalletAddress>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.as_ref().map(WalletAddress::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<WalletAddress>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(None);
        }
        WalletAddress::parse(&raw).map(Some).map_err(serde::de::Error::custom)
    }
}

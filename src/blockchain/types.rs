use chrono::{DateTime, TimeZone, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;
use crate::models::{TransactionHash, WalletAddress};

/// New-block header as pushed by the header subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub number: u64,
    pub hash: String,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub transactions: Vec<ChainTransaction>,
}

impl Block {
    pub fn timestamp_utc(&self) -> Result<DateTime<Utc>, ProcessingError> {
        Utc.timestamp_opt(self.timestamp as i64, 0)
            .single()
            .ok_or_else(|| {
                ProcessingError::BlockParsing(format!(
                    "Block {} has out-of-range timestamp {}",
                    self.number, self.timestamp
                ))
            })
    }
}

/// A transaction as returned by the node, sender already recovered
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTransaction {
    pub hash: TransactionHash,
    pub from: WalletAddress,
    pub to: Option<WalletAddress>,
    pub value: BigUint,
    pub gas_price: BigUint,
    /// `None` while pending
    pub block_number: Option<u64>,
}

impl ChainTransaction {
    pub fn has_value(&self) -> bool {
        self.value != BigUint::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub transaction_hash: TransactionHash,
    pub block_number: u64,
    pub block_hash: String,
    pub gas_used: u64,
    pub contract_address: Option<WalletAddress>,
    /// In receipt order
    pub logs: Vec<RawLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

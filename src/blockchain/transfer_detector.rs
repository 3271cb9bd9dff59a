use alloy::primitives::{Address, B256};
use alloy::sol_types::SolEvent;
use num_bigint::BigUint;
use serde_json::json;
use std::sync::Arc;

use crate::blockchain::abi::Transfer as TransferEvent;
use crate::blockchain::token_resolver::TokenResolver;
use crate::blockchain::types::{ChainTransaction, RawLog, Receipt};
use crate::error::ProcessingError;
use crate::logging::LogContext;
use crate::models::{strip_hex_prefix, Transfer, WalletAddress, NATIVE_LOG_INDEX};

/// ERC-20 Transfer event signature: Transfer(address indexed from, address indexed to, uint256 value)
pub const TRANSFER_EVENT_SIGNATURE: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// First topic is the Transfer signature and both parties are indexed
pub fn is_transfer_log(log: &RawLog) -> bool {
    log.topics.len() >= 3 && log.topics[0].eq_ignore_ascii_case(TRANSFER_EVENT_SIGNATURE)
}

/// Sender, direct recipient, or a party of any Transfer log in the receipt
pub fn is_address_involved(tx: &ChainTransaction, receipt: &Receipt, address: &WalletAddress) -> bool {
    if &tx.from == address || tx.to.as_ref() == Some(address) {
        return true;
    }

    receipt.logs.iter().filter(|log| is_transfer_log(log)).any(|log| {
        topic_matches(&log.topics[1], address) || topic_matches(&log.topics[2], address)
    })
}

fn topic_matches(topic: &str, address: &WalletAddress) -> bool {
    WalletAddress::from_topic(topic).map_or(false, |party| &party == address)
}

/// Keep only the transfers where `address` is a party
pub fn narrow_transfers(transfers: &[Transfer], address: &WalletAddress) -> Vec<Transfer> {
    transfers.iter().filter(|t| t.involves(address)).cloned().collect()
}

/// Decode the parties and amount of a Transfer log; the symbol is filled in by the caller.
///
/// ERC-20 logs go through the ABI binding. Payloads that are not a single
/// `uint256` word (ERC-721 style, odd widths) keep the topic parties and read
/// the data as a big-endian integer.
pub fn decode_transfer_log(log: &RawLog) -> Result<(WalletAddress, WalletAddress, WalletAddress, BigUint), ProcessingError> {
    if !is_transfer_log(log) {
        return Err(ProcessingError::LogParsing("not a Transfer event".to_string()));
    }

    let token = WalletAddress::parse(&log.address)
        .map_err(|e| ProcessingError::LogParsing(format!("emitter: {}", e)))?;
    let topics = log.topics[..3]
        .iter()
        .map(|topic| parse_topic(topic))
        .collect::<Result<Vec<B256>, _>>()?;
    let data = hex::decode(strip_hex_prefix(&log.data))
        .map_err(|e| ProcessingError::AmountParsing(format!("invalid hex data '{}': {}", log.data, e)))?;

    if let Ok(event) = TransferEvent::decode_raw_log(topics.iter().copied(), &data) {
        let value = BigUint::from_bytes_be(&event.value.to_be_bytes::<32>());
        return Ok((token, event.from.into(), event.to.into(), value));
    }

    let from = Address::from_word(topics[1]).into();
    let to = Address::from_word(topics[2]).into();
    Ok((token, from, to, BigUint::from_bytes_be(&data)))
}

fn parse_topic(topic: &str) -> Result<B256, ProcessingError> {
    topic
        .parse::<B256>()
        .map_err(|e| ProcessingError::LogParsing(format!("topic '{}': {}", topic, e)))
}

/// Turns a transaction and its receipt into the ordered list of asset transfers
pub struct TransferDetector {
    resolver: Arc<TokenResolver>,
    native_symbol: String,
}

impl TransferDetector {
    pub fn new(resolver: Arc<TokenResolver>) -> Self {
        let native_symbol = resolver.native_symbol().to_string();
        Self { resolver, native_symbol }
    }

    pub fn resolver(&self) -> &TokenResolver {
        &self.resolver
    }

    /// Native transfer first (if any value moved), then token transfers in receipt log order.
    ///
    /// Logs that look like Transfer events but cannot be decoded are skipped.
    pub async fn extract_transfers(&self, tx: &ChainTransaction, receipt: &Receipt) -> Vec<Transfer> {
        let mut transfers = Vec::new();

        if tx.has_value() {
            // Contract creation moves value to the new contract
            let to = tx
                .to
                .clone()
                .or_else(|| receipt.contract_address.clone())
                .unwrap_or_else(WalletAddress::zero);

            transfers.push(Transfer {
                tx_hash: tx.hash.clone(),
                from: tx.from.clone(),
                to,
                value: tx.value.clone(),
                token_symbol: self.native_symbol.clone(),
                token_address: WalletAddress::zero(),
                log_index: NATIVE_LOG_INDEX,
            });
        }

        for (position, log) in receipt.logs.iter().enumerate() {
            if !is_transfer_log(log) {
                continue;
            }

            let (token, from, to, value) = match decode_transfer_log(log) {
                Ok(decoded) => decoded,
                Err(e) => {
                    LogContext::new("transfer_detector", "extract_transfers")
                        .with_transaction_hash(tx.hash.as_str())
                        .with_metadata("log_index", json!(position))
                        .warn(&format!("Skipping undecodable Transfer log: {}", e));
                    continue;
                }
            };

            let token_symbol = self.resolver.resolve(&token).await;
            transfers.push(Transfer {
                tx_hash: tx.hash.clone(),
                from,
                to,
                value,
                token_symbol,
                token_address: token,
                log_index: position as i64,
            });
        }

        transfers
    }
}

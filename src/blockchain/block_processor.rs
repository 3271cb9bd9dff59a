use futures_util::stream::{self, StreamExt};
use serde_json::json;
use std::pin::pin;
use std::sync::Arc;

use crate::blockchain::transfer_detector::{is_address_involved, narrow_transfers, TransferDetector};
use crate::blockchain::types::{BlockHeader, ChainTransaction, Receipt};
use crate::blockchain::BlockSource;
use crate::error::{ProcessingError, RpcError, TrackerError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{Transaction, TransactionHash, Transfer, WalletAddress};
use chrono::{DateTime, Utc};

/// A transaction touching a watched wallet
#[derive(Debug, Clone, PartialEq)]
pub struct WalletActivity {
    /// Carries every transfer of the transaction
    pub transaction: Transaction,
    /// Only the transfers involving the watched wallet, never empty
    pub transfers: Vec<Transfer>,
}

pub struct BlockProcessor {
    source: Arc<dyn BlockSource>,
    detector: TransferDetector,
    batch_size: usize,
}

impl BlockProcessor {
    pub fn new(source: Arc<dyn BlockSource>, detector: TransferDetector, batch_size: usize) -> Self {
        Self {
            source,
            detector,
            batch_size: batch_size.max(1),
        }
    }

    pub fn detector(&self) -> &TransferDetector {
        &self.detector
    }

    /// Scan one block for transactions involving `address`.
    ///
    /// Every transaction's receipt is fetched, at most `batch_size` at a time,
    /// and results come back in block order. Transactions whose receipt cannot
    /// be fetched are skipped.
    pub async fn process_block(
        &self,
        header: &BlockHeader,
        address: &WalletAddress,
    ) -> Result<Vec<WalletActivity>, TrackerError> {
        let monitor = PerformanceMonitor::new("process_block");
        let block = self.source.block_by_hash(&header.hash).await?;
        let timestamp = block.timestamp_utc()?;

        // Each fetch owns its transaction and source handle so the scan can run on a spawned task
        let fetches: Vec<_> = block
            .transactions
            .iter()
            .cloned()
            .map(|tx| {
                let source = Arc::clone(&self.source);
                async move {
                    let receipt = source.transaction_receipt(&tx.hash).await;
                    (tx, receipt)
                }
            })
            .collect();
        let mut receipts = pin!(stream::iter(fetches).buffered(self.batch_size));

        let mut activities = Vec::new();
        while let Some((tx, receipt)) = receipts.next().await {
            let tx = &tx;
            let receipt = match receipt {
                Ok(receipt) => receipt,
                Err(e) => {
                    LogContext::new("block_processor", "process_block")
                        .with_block_number(block.number)
                        .with_transaction_hash(tx.hash.as_str())
                        .debug(&format!("Skipping transaction without receipt: {}", e));
                    continue;
                }
            };

            if !is_address_involved(tx, &receipt, address) {
                continue;
            }

            let transfers = self.detector.extract_transfers(tx, &receipt).await;
            let narrowed = narrow_transfers(&transfers, address);
            if narrowed.is_empty() {
                continue;
            }

            activities.push(WalletActivity {
                transaction: build_transaction(tx, &receipt, block.number, timestamp, transfers),
                transfers: narrowed,
            });
        }

        MetricsLogger::log_block_scanned(address.as_str(), block.number, activities.len(), monitor.finish_quiet());
        Ok(activities)
    }

    /// Fetch one mined transaction with all of its transfers
    pub async fn transaction_details(&self, hash: &TransactionHash) -> Result<Transaction, TrackerError> {
        let tx = self
            .source
            .transaction_by_hash(hash)
            .await?
            .ok_or_else(|| RpcError::NotFound(format!("transaction {}", hash)))?;

        if tx.block_number.is_none() {
            return Err(ProcessingError::PendingTransaction(hash.to_string()).into());
        }

        let receipt = self.source.transaction_receipt(hash).await?;
        let block = self.source.block_by_hash(&receipt.block_hash).await?;
        let timestamp = block.timestamp_utc()?;

        let transfers = self.detector.extract_transfers(&tx, &receipt).await;

        LogContext::new("block_processor", "transaction_details")
            .with_transaction_hash(hash.as_str())
            .with_block_number(receipt.block_number)
            .with_metadata("transfer_count", json!(transfers.len()))
            .debug("Fetched transaction details");

        Ok(build_transaction(&tx, &receipt, receipt.block_number, timestamp, transfers))
    }

    /// Transfers of one transaction where `address` is a party
    pub async fn transfers_for_address(
        &self,
        hash: &TransactionHash,
        address: &WalletAddress,
    ) -> Result<Vec<Transfer>, TrackerError> {
        let transaction = self.transaction_details(hash).await?;
        Ok(narrow_transfers(&transaction.transfers, address))
    }
}

fn build_transaction(
    tx: &ChainTransaction,
    receipt: &Receipt,
    block_number: u64,
    timestamp: DateTime<Utc>,
    transfers: Vec<Transfer>,
) -> Transaction {
    Transaction {
        hash: tx.hash.clone(),
        from: tx.from.clone(),
        to: tx.to.clone(),
        block_number,
        timestamp,
        gas_used: receipt.gas_used,
        gas_price: tx.gas_price.clone(),
        transfers,
    }
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use super::types::{Block, BlockHeader, ChainTransaction, Receipt};
use super::{BlockSource, HeaderSubscription};
use crate::error::RpcError;
use crate::models::{TransactionHash, WalletAddress};

/// In-memory node for unit tests
pub(crate) struct MockBlockSource {
    blocks: Mutex<HashMap<String, Block>>,
    transactions: Mutex<HashMap<TransactionHash, ChainTransaction>>,
    receipts: Mutex<HashMap<TransactionHash, Receipt>>,
    call_results: Mutex<HashMap<WalletAddress, String>>,
    header_senders: Mutex<Vec<mpsc::Sender<Result<BlockHeader, RpcError>>>>,
    chain_id: u64,
    fail_subscriptions: bool,
    receipt_delay_ms: u64,
    call_count: AtomicUsize,
    receipt_count: AtomicUsize,
    subscribe_count: AtomicUsize,
}

impl MockBlockSource {
    pub(crate) fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            receipts: Mutex::new(HashMap::new()),
            call_results: Mutex::new(HashMap::new()),
            header_senders: Mutex::new(Vec::new()),
            chain_id: 9745,
            fail_subscriptions: false,
            receipt_delay_ms: 0,
            call_count: AtomicUsize::new(0),
            receipt_count: AtomicUsize::new(0),
            subscribe_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_call_result(self, token: &str, return_data: String) -> Self {
        let token = WalletAddress::parse(token).unwrap();
        self.call_results.lock().unwrap().insert(token, return_data);
        self
    }

    pub(crate) fn with_failing_subscriptions(mut self) -> Self {
        self.fail_subscriptions = true;
        self
    }

    pub(crate) fn with_receipt_delay(mut self, delay_ms: u64) -> Self {
        self.receipt_delay_ms = delay_ms;
        self
    }

    /// Registers the block and every transaction in it
    pub(crate) fn add_block(&self, block: Block) {
        let mut transactions = self.transactions.lock().unwrap();
        for tx in &block.transactions {
            transactions.insert(tx.hash.clone(), tx.clone());
        }
        self.blocks.lock().unwrap().insert(block.hash.clone(), block);
    }

    pub(crate) fn add_transaction(&self, tx: ChainTransaction) {
        self.transactions.lock().unwrap().insert(tx.hash.clone(), tx);
    }

    pub(crate) fn add_receipt(&self, receipt: Receipt) {
        self.receipts
            .lock()
            .unwrap()
            .insert(receipt.transaction_hash.clone(), receipt);
    }

    /// Deliver a header to every live subscription
    pub(crate) fn push_header(&self, header: BlockHeader) {
        let mut senders = self.header_senders.lock().unwrap();
        senders.retain(|sender| !sender.is_closed());
        for sender in senders.iter() {
            let _ = sender.try_send(Ok(header.clone()));
        }
    }

    /// Fail every live subscription, as a dropped socket would
    pub(crate) fn break_subscriptions(&self) {
        let mut senders = self.header_senders.lock().unwrap();
        for sender in senders.drain(..) {
            let _ = sender.try_send(Err(RpcError::SubscriptionClosed("socket dropped".to_string())));
        }
    }

    pub(crate) fn active_subscriptions(&self) -> usize {
        self.header_senders
            .lock()
            .unwrap()
            .iter()
            .filter(|sender| !sender.is_closed())
            .count()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub(crate) fn receipt_count(&self) -> usize {
        self.receipt_count.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe_count(&self) -> usize {
        self.subscribe_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockSource for MockBlockSource {
    async fn subscribe_new_heads(&self) -> Result<HeaderSubscription, RpcError> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscriptions {
            return Err(RpcError::WebSocket("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(16);
        self.header_senders.lock().unwrap().push(tx);
        Ok(HeaderSubscription::from_channel(rx))
    }

    async fn block_by_hash(&self, hash: &str) -> Result<Block, RpcError> {
        self.blocks
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| RpcError::NotFound(format!("block {}", hash)))
    }

    async fn latest_block(&self) -> Result<Block, RpcError> {
        self.blocks
            .lock()
            .unwrap()
            .values()
            .max_by_key(|block| block.number)
            .cloned()
            .ok_or_else(|| RpcError::NotFound("latest block".to_string()))
    }

    async fn transaction_by_hash(&self, hash: &TransactionHash) -> Result<Option<ChainTransaction>, RpcError> {
        Ok(self.transactions.lock().unwrap().get(hash).cloned())
    }

    async fn transaction_receipt(&self, hash: &TransactionHash) -> Result<Receipt, RpcError> {
        if self.receipt_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.receipt_delay_ms)).await;
        }
        self.receipt_count.fetch_add(1, Ordering::SeqCst);
        self.receipts
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| RpcError::NotFound(format!("receipt for {}", hash)))
    }

    async fn call(&self, to: &WalletAddress, _data: &str) -> Result<String, RpcError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.call_results
            .lock()
            .unwrap()
            .get(to)
            .cloned()
            .ok_or_else(|| RpcError::Method {
                code: -32000,
                message: "execution reverted".to_string(),
            })
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(self.chain_id)
    }
}

pub mod abi;
pub mod block_processor;
pub mod header_stream;
pub mod node_client;
pub mod rpc_client;
pub mod token_resolver;
pub mod transfer_detector;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::RpcError;
use crate::models::{TransactionHash, WalletAddress};

pub use block_processor::{BlockProcessor, WalletActivity};
pub use header_stream::HeaderSubscriber;
pub use node_client::NodeClient;
pub use rpc_client::RpcClient;
pub use token_resolver::TokenResolver;
pub use transfer_detector::{
    is_address_involved, is_transfer_log, narrow_transfers, TransferDetector, TRANSFER_EVENT_SIGNATURE,
};
pub use types::{Block, BlockHeader, ChainTransaction, RawLog, Receipt};

/// Everything the tracker needs from a node
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Push subscription to new block headers
    async fn subscribe_new_heads(&self) -> Result<HeaderSubscription, RpcError>;

    /// Full block with transaction objects
    async fn block_by_hash(&self, hash: &str) -> Result<Block, RpcError>;

    async fn latest_block(&self) -> Result<Block, RpcError>;

    async fn transaction_by_hash(&self, hash: &TransactionHash) -> Result<Option<ChainTransaction>, RpcError>;

    /// `RpcError::NotFound` when the node has no receipt yet
    async fn transaction_receipt(&self, hash: &TransactionHash) -> Result<Receipt, RpcError>;

    /// Read-only contract call, returns the hex-encoded return data
    async fn call(&self, to: &WalletAddress, data: &str) -> Result<String, RpcError>;

    async fn chain_id(&self) -> Result<u64, RpcError>;
}

/// Stream of new block headers.
///
/// An `Err` item or the end of the stream means the subscription is gone.
/// Dropping the subscription cancels the producer, which unsubscribes.
pub struct HeaderSubscription {
    receiver: mpsc::Receiver<Result<BlockHeader, RpcError>>,
    shutdown: CancellationToken,
}

impl HeaderSubscription {
    pub fn new(receiver: mpsc::Receiver<Result<BlockHeader, RpcError>>, shutdown: CancellationToken) -> Self {
        Self { receiver, shutdown }
    }

    /// Subscription fed directly by a channel, for sources without a remote producer
    pub fn from_channel(receiver: mpsc::Receiver<Result<BlockHeader, RpcError>>) -> Self {
        Self::new(receiver, CancellationToken::new())
    }

    pub async fn next(&mut self) -> Option<Result<BlockHeader, RpcError>> {
        self.receiver.recv().await
    }
}

impl Drop for HeaderSubscription {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_header_subscription_yields_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let mut subscription = HeaderSubscription::from_channel(rx);

        tx.send(Ok(BlockHeader { number: 2, hash: "0x02".to_string() })).await.unwrap();
        tx.send(Ok(BlockHeader { number: 1, hash: "0x01".to_string() })).await.unwrap();
        drop(tx);

        assert_eq!(subscription.next().await.unwrap().unwrap().number, 2);
        assert_eq!(subscription.next().await.unwrap().unwrap().number, 1);
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_subscription_cancels_producer() {
        let (_tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let subscription = HeaderSubscription::new(rx, token.clone());

        assert!(!token.is_cancelled());
        drop(subscription);
        assert!(token.is_cancelled());
    }
}

use async_trait::async_trait;

use crate::blockchain::header_stream::HeaderSubscriber;
use crate::blockchain::rpc_client::RpcClient;
use crate::blockchain::types::{Block, ChainTransaction, Receipt};
use crate::blockchain::{BlockSource, HeaderSubscription};
use crate::config::BlockchainConfig;
use crate::error::RpcError;
use crate::models::{TransactionHash, WalletAddress};

/// Node access over HTTP JSON-RPC for pulls and WebSocket for header pushes
#[derive(Clone)]
pub struct NodeClient {
    rpc: RpcClient,
    headers: HeaderSubscriber,
}

impl NodeClient {
    pub fn new(rpc: RpcClient, headers: HeaderSubscriber) -> Self {
        Self { rpc, headers }
    }

    pub fn from_config(config: &BlockchainConfig, header_buffer: usize) -> Result<Self, RpcError> {
        let rpc = RpcClient::new_with_config(config.rpc_url.clone(), config.request_timeout_seconds)?;
        let headers = HeaderSubscriber::new(config.ws_url.clone(), header_buffer);
        Ok(Self::new(rpc, headers))
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Liveness check used by the health endpoints
    pub async fn ping(&self) -> Result<u64, RpcError> {
        self.rpc.get_latest_block_number().await
    }
}

#[async_trait]
impl BlockSource for NodeClient {
    async fn subscribe_new_heads(&self) -> Result<HeaderSubscription, RpcError> {
        self.headers.subscribe().await
    }

    async fn block_by_hash(&self, hash: &str) -> Result<Block, RpcError> {
        self.rpc.get_block_by_hash(hash).await
    }

    async fn latest_block(&self) -> Result<Block, RpcError> {
        self.rpc.get_latest_block().await
    }

    async fn transaction_by_hash(&self, hash: &TransactionHash) -> Result<Option<ChainTransaction>, RpcError> {
        self.rpc.get_transaction_by_hash(hash).await
    }

    async fn transaction_receipt(&self, hash: &TransactionHash) -> Result<Receipt, RpcError> {
        self.rpc.get_transaction_receipt(hash).await
    }

    async fn call(&self, to: &WalletAddress, data: &str) -> Result<String, RpcError> {
        self.rpc.call(to, data).await
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.rpc.get_chain_id().await
    }
}

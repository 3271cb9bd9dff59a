use num_bigint::BigUint;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::types::{Block, ChainTransaction, RawLog, Receipt};
use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{strip_hex_prefix, TransactionHash, WalletAddress};

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<Value>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct EthBlock {
    number: String,
    hash: String,
    timestamp: String,
    #[serde(default)]
    transactions: Vec<EthTransaction>,
}

#[derive(Debug, Deserialize)]
struct EthTransaction {
    hash: String,
    from: String,
    to: Option<String>,
    value: String,
    #[serde(rename = "gasPrice")]
    gas_price: Option<String>,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EthReceipt {
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "blockHash")]
    block_hash: String,
    #[serde(rename = "gasUsed")]
    gas_used: String,
    #[serde(rename = "contractAddress")]
    contract_address: Option<String>,
    logs: Vec<EthLog>,
}

#[derive(Debug, Deserialize)]
struct EthLog {
    address: String,
    topics: Vec<String>,
    data: String,
}

/// HTTP JSON-RPC client for pull operations against the node
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(endpoint: String) -> Result<Self, RpcError> {
        Self::new_with_config(endpoint, 30)
    }

    /// RPC client with timeout and connection pooling
    pub fn new_with_config(endpoint: String, timeout_seconds: u64) -> Result<Self, RpcError> {
        let context = LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", json!(endpoint))
            .with_metadata("timeout_seconds", json!(timeout_seconds));
        context.info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            timeout_seconds,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn make_request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let monitor = PerformanceMonitor::new(&format!("rpc_{}", method));
        let result = self.send(&request).await;
        let duration = monitor.finish_quiet();
        MetricsLogger::log_rpc_call(method, duration, result.is_ok());

        result
    }

    async fn send(&self, request: &JsonRpcRequest) -> Result<Value, RpcError> {
        let context = LogContext::new("rpc_client", "make_request")
            .with_metadata("method", json!(request.method));
        context.trace(&format!("Sending RPC request: {}", request.method));

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                // Classify HTTP errors
                if e.is_timeout() {
                    RpcError::Timeout { seconds: self.timeout_seconds }
                } else if e.is_connect() {
                    RpcError::Connection(e.to_string())
                } else {
                    RpcError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Connection(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.text().await?;
        let rpc_response: JsonRpcResponse = serde_json::from_str(&body)?;

        if let Some(error) = rpc_response.error {
            return Err(match error.code {
                -32700 => RpcError::InvalidResponse("Parse error".to_string()),
                -32600 => RpcError::InvalidResponse("Invalid request".to_string()),
                -32602 => RpcError::InvalidResponse("Invalid params".to_string()),
                _ => RpcError::Method { code: error.code, message: error.message },
            });
        }

        // A JSON null result is a valid answer ("not found") and is kept as Value::Null
        Ok(rpc_response.result.unwrap_or(Value::Null))
    }

    async fn request_object<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
        what: &str,
    ) -> Result<Option<T>, RpcError> {
        let value = self.make_request(method, params).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| RpcError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    pub async fn get_chain_id(&self) -> Result<u64, RpcError> {
        let value = self.make_request("eth_chainId", vec![]).await?;
        let hex = value
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("Chain id is not a string".to_string()))?;
        parse_hex_to_u64(hex)
    }

    pub async fn get_latest_block_number(&self) -> Result<u64, RpcError> {
        let value = self.make_request("eth_blockNumber", vec![]).await?;
        let hex = value
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("Block number is not a string".to_string()))?;
        parse_hex_to_u64(hex)
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> Result<Block, RpcError> {
        let params = vec![json!(hash), json!(true)]; // Include full transaction objects
        let block: EthBlock = self
            .request_object("eth_getBlockByHash", params, "block")
            .await?
            .ok_or_else(|| RpcError::NotFound(format!("block {}", hash)))?;

        let block = convert_block(block)?;
        LogContext::new("rpc_client", "get_block_by_hash")
            .with_block_number(block.number)
            .with_metadata("transaction_count", json!(block.transactions.len()))
            .debug(&format!(
                "Retrieved block {} with {} transactions",
                block.number,
                block.transactions.len()
            ));
        Ok(block)
    }

    pub async fn get_latest_block(&self) -> Result<Block, RpcError> {
        let params = vec![json!("latest"), json!(true)];
        let block: EthBlock = self
            .request_object("eth_getBlockByNumber", params, "block")
            .await?
            .ok_or_else(|| RpcError::NotFound("latest block".to_string()))?;
        convert_block(block)
    }

    pub async fn get_transaction_by_hash(
        &self,
        hash: &TransactionHash,
    ) -> Result<Option<ChainTransaction>, RpcError> {
        let tx: Option<EthTransaction> = self
            .request_object("eth_getTransactionByHash", vec![json!(hash.as_str())], "transaction")
            .await?;
        tx.map(convert_transaction).transpose()
    }

    pub async fn get_transaction_receipt(&self, hash: &TransactionHash) -> Result<Receipt, RpcError> {
        let receipt: EthReceipt = self
            .request_object("eth_getTransactionReceipt", vec![json!(hash.as_str())], "receipt")
            .await?
            .ok_or_else(|| RpcError::NotFound(format!("receipt for {}", hash)))?;
        convert_receipt(receipt)
    }

    /// Read-only contract call against the latest block
    pub async fn call(&self, to: &WalletAddress, data: &str) -> Result<String, RpcError> {
        let params = vec![json!({ "to": to.as_str(), "data": data }), json!("latest")];
        let value = self.make_request("eth_call", params).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::InvalidResponse("eth_call result is not a string".to_string()))
    }
}

fn convert_block(block: EthBlock) -> Result<Block, RpcError> {
    let transactions = block
        .transactions
        .into_iter()
        .map(convert_transaction)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Block {
        number: parse_hex_to_u64(&block.number)?,
        hash: block.hash,
        timestamp: parse_hex_to_u64(&block.timestamp)?,
        transactions,
    })
}

fn convert_transaction(tx: EthTransaction) -> Result<ChainTransaction, RpcError> {
    Ok(ChainTransaction {
        hash: parse_hash(&tx.hash)?,
        from: parse_address(&tx.from)?,
        to: tx.to.as_deref().map(parse_address).transpose()?,
        value: parse_hex_to_biguint(&tx.value)?,
        gas_price: tx
            .gas_price
            .as_deref()
            .map(parse_hex_to_biguint)
            .transpose()?
            .unwrap_or_default(),
        block_number: tx.block_number.as_deref().map(parse_hex_to_u64).transpose()?,
    })
}

fn convert_receipt(receipt: EthReceipt) -> Result<Receipt, RpcError> {
    Ok(Receipt {
        transaction_hash: parse_hash(&receipt.transaction_hash)?,
        block_number: parse_hex_to_u64(&receipt.block_number)?,
        block_hash: receipt.block_hash,
        gas_used: parse_hex_to_u64(&receipt.gas_used)?,
        contract_address: receipt.contract_address.as_deref().map(parse_address).transpose()?,
        logs: receipt
            .logs
            .into_iter()
            .map(|log| RawLog {
                address: log.address,
                topics: log.topics,
                data: log.data,
            })
            .collect(),
    })
}

fn parse_address(value: &str) -> Result<WalletAddress, RpcError> {
    WalletAddress::parse(value).map_err(|e| RpcError::InvalidResponse(e.to_string()))
}

fn parse_hash(value: &str) -> Result<TransactionHash, RpcError> {
    TransactionHash::parse(value).map_err(|e| RpcError::InvalidResponse(e.to_string()))
}

pub(crate) fn parse_hex_to_u64(hex_str: &str) -> Result<u64, RpcError> {
    u64::from_str_radix(strip_hex_prefix(hex_str), 16)
        .map_err(|e| RpcError::InvalidResponse(format!("Failed to parse hex '{}' to u64: {}", hex_str, e)))
}

pub(crate) fn parse_hex_to_biguint(hex_str: &str) -> Result<BigUint, RpcError> {
    let digits = strip_hex_prefix(hex_str);
    if digits.is_empty() {
        return Ok(BigUint::default());
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| RpcError::InvalidResponse(format!("Failed to parse hex quantity '{}'", hex_str)))
}

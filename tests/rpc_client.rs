use serde_json::json;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use plasma_wallet_tracker::blockchain::RpcClient;
use plasma_wallet_tracker::error::RpcError;
use plasma_wallet_tracker::models::{TransactionHash, WalletAddress};

const TX_HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";
const SENDER: &str = "0xf977814e90da44bfa03b6295a0616a897441acec";
const TOKEN: &str = "0xa0b86a33e6ba0c74d75c9abfd35e5e0b1bcceb83";

async fn mount_result(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_chain_id_and_block_number() {
    let server = MockServer::start().await;
    mount_result(&server, "eth_chainId", json!("0x2611")).await;
    mount_result(&server, "eth_blockNumber", json!("0x1b4")).await;

    let client = RpcClient::new(server.uri()).unwrap();
    assert_eq!(client.get_chain_id().await.unwrap(), 9745);
    assert_eq!(client.get_latest_block_number().await.unwrap(), 436);
}

#[tokio::test]
async fn test_block_with_full_transactions() {
    let server = MockServer::start().await;
    mount_result(
        &server,
        "eth_getBlockByHash",
        json!({
            "number": "0x10",
            "hash": "0xabc",
            "timestamp": "0x6553f100",
            "transactions": [{
                "hash": TX_HASH,
                "from": "0xF977814e90dA44bFA03b6295A0616a897441aceC",
                "to": null,
                "value": "0xde0b6b3a7640000",
                "gasPrice": "0x3b9aca00",
                "blockNumber": "0x10"
            }]
        }),
    )
    .await;

    let client = RpcClient::new(server.uri()).unwrap();
    let block = client.get_block_by_hash("0xabc").await.unwrap();

    assert_eq!(block.number, 16);
    assert_eq!(block.timestamp, 0x6553f100);
    assert_eq!(block.transactions.len(), 1);

    let tx = &block.transactions[0];
    assert_eq!(tx.from.as_str(), SENDER);
    assert!(tx.to.is_none());
    assert_eq!(tx.value.to_string(), "1000000000000000000");
    assert_eq!(tx.gas_price.to_string(), "1000000000");
    assert_eq!(tx.block_number, Some(16));
}

#[tokio::test]
async fn test_null_results() {
    let server = MockServer::start().await;
    mount_result(&server, "eth_getTransactionByHash", json!(null)).await;
    mount_result(&server, "eth_getTransactionReceipt", json!(null)).await;
    mount_result(&server, "eth_getBlockByHash", json!(null)).await;

    let client = RpcClient::new(server.uri()).unwrap();
    let hash = TransactionHash::parse(TX_HASH).unwrap();

    assert!(client.get_transaction_by_hash(&hash).await.unwrap().is_none());
    assert!(matches!(client.get_transaction_receipt(&hash).await, Err(RpcError::NotFound(_))));
    assert!(matches!(client.get_block_by_hash("0xdead").await, Err(RpcError::NotFound(_))));
}

#[tokio::test]
async fn test_receipt_logs_keep_order() {
    let server = MockServer::start().await;
    mount_result(
        &server,
        "eth_getTransactionReceipt",
        json!({
            "transactionHash": TX_HASH,
            "blockNumber": "0x10",
            "blockHash": "0xabc",
            "gasUsed": "0x5208",
            "contractAddress": null,
            "logs": [
                { "address": TOKEN, "topics": ["0x01"], "data": "0x" },
                { "address": SENDER, "topics": [], "data": "0x02" }
            ]
        }),
    )
    .await;

    let client = RpcClient::new(server.uri()).unwrap();
    let receipt = client
        .get_transaction_receipt(&TransactionHash::parse(TX_HASH).unwrap())
        .await
        .unwrap();

    assert_eq!(receipt.gas_used, 21000);
    assert_eq!(receipt.block_number, 16);
    assert!(receipt.contract_address.is_none());
    assert_eq!(receipt.logs.len(), 2);
    assert_eq!(receipt.logs[0].address, TOKEN);
    assert_eq!(receipt.logs[1].data, "0x02");
}

#[tokio::test]
async fn test_eth_call_returns_hex() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_call",
            "params": [{ "to": TOKEN, "data": "0x95d89b41" }, "latest"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": "0x1234"
        })))
        .mount(&server)
        .await;

    let client = RpcClient::new(server.uri()).unwrap();
    let result = client.call(&WalletAddress::parse(TOKEN).unwrap(), "0x95d89b41").await.unwrap();
    assert_eq!(result, "0x1234");
}

#[tokio::test]
async fn test_failure_modes() {
    let server = MockServer::start().await;
    let client = RpcClient::new(server.uri()).unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;
    assert!(matches!(client.get_latest_block_number().await, Err(RpcError::Connection(_))));

    server.reset().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .mount(&server)
        .await;
    assert!(matches!(client.get_latest_block_number().await, Err(RpcError::Json(_))));

    server.reset().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32603, "message": "Internal error" }
        })))
        .mount(&server)
        .await;
    match client.get_latest_block_number().await {
        Err(RpcError::Method { code, message }) => {
            assert_eq!(code, -32603);
            assert_eq!(message, "Internal error");
        }
        other => panic!("expected method error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_fails_fast() {
    let client = RpcClient::new_with_config("http://127.0.0.1:9".to_string(), 2).unwrap();

    let start = Instant::now();
    let result = timeout(Duration::from_secs(5), client.get_latest_block_number()).await;

    assert!(matches!(result, Ok(Err(_))));
    assert!(start.elapsed() < Duration::from_secs(5));
}

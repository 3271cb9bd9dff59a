use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::blockchain::rpc_client::parse_hex_to_u64;
use crate::blockchain::types::BlockHeader;
use crate::blockchain::HeaderSubscription;
use crate::error::RpcError;
use crate::logging::LogContext;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSender = SplitSink<WsStream, Message>;
type WsReceiver = SplitStream<WsStream>;

const SUBSCRIBE_REQUEST_ID: u64 = 1;
const UNSUBSCRIBE_REQUEST_ID: u64 = 2;
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens `eth_subscribe("newHeads")` subscriptions, one WebSocket per subscription
#[derive(Debug, Clone)]
pub struct HeaderSubscriber {
    ws_url: String,
    buffer: usize,
}

impl HeaderSubscriber {
    pub fn new(ws_url: String, buffer: usize) -> Self {
        Self {
            ws_url,
            buffer: buffer.max(1),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub async fn subscribe(&self) -> Result<HeaderSubscription, RpcError> {
        let context = LogContext::new("header_stream", "subscribe")
            .with_metadata("ws_url", json!(self.ws_url));

        let (ws_stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| RpcError::WebSocket(format!("connect to {} failed: {}", self.ws_url, e)))?;
        let (mut sender, mut receiver) = ws_stream.split();

        let request = json!({
            "jsonrpc": "2.0",
            "id": SUBSCRIBE_REQUEST_ID,
            "method": "eth_subscribe",
            "params": ["newHeads"],
        });
        sender
            .send(Message::Text(request.to_string()))
            .await
            .map_err(|e| RpcError::WebSocket(e.to_string()))?;

        let subscription_id = tokio::time::timeout(SUBSCRIBE_TIMEOUT, await_subscription_id(&mut receiver))
            .await
            .map_err(|_| RpcError::Timeout { seconds: SUBSCRIBE_TIMEOUT.as_secs() })??;

        context
            .with_metadata("subscription_id", json!(subscription_id))
            .debug("Subscribed to new heads");

        let (tx, rx) = mpsc::channel(self.buffer);
        let shutdown = CancellationToken::new();
        tokio::spawn(pump_headers(sender, receiver, subscription_id, tx, shutdown.clone()));

        Ok(HeaderSubscription::new(rx, shutdown))
    }
}

async fn await_subscription_id(receiver: &mut WsReceiver) -> Result<String, RpcError> {
    while let Some(message) = receiver.next().await {
        let text = match message.map_err(|e| RpcError::WebSocket(e.to_string()))? {
            Message::Text(text) => text,
            Message::Close(frame) => {
                return Err(RpcError::SubscriptionClosed(format!("closed before confirmation: {:?}", frame)))
            }
            _ => continue,
        };

        let reply: Value = serde_json::from_str(&text)?;
        if reply.get("id").and_then(Value::as_u64) != Some(SUBSCRIBE_REQUEST_ID) {
            continue;
        }
        if let Some(error) = reply.get("error") {
            return Err(RpcError::Method {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default() as i32,
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("eth_subscribe rejected")
                    .to_string(),
            });
        }
        return reply
            .get("result")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RpcError::InvalidResponse("eth_subscribe returned no subscription id".to_string()));
    }

    Err(RpcError::SubscriptionClosed("stream ended before confirmation".to_string()))
}

/// Forward headers until cancelled, the consumer goes away, or the socket fails
async fn pump_headers(
    mut sender: WsSender,
    mut receiver: WsReceiver,
    subscription_id: String,
    tx: mpsc::Sender<Result<BlockHeader, RpcError>>,
    shutdown: CancellationToken,
) {
    let context = LogContext::new("header_stream", "pump")
        .with_metadata("subscription_id", json!(subscription_id));

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                let request = json!({
                    "jsonrpc": "2.0",
                    "id": UNSUBSCRIBE_REQUEST_ID,
                    "method": "eth_unsubscribe",
                    "params": [subscription_id],
                });
                if let Err(e) = sender.send(Message::Text(request.to_string())).await {
                    context.debug(&format!("eth_unsubscribe not sent: {}", e));
                }
                let _ = sender.close().await;
                context.debug("Header subscription cancelled");
                return;
            }

            message = receiver.next() => {
                let failure = match message {
                    Some(Ok(Message::Text(text))) => match parse_header_notification(&text, &subscription_id) {
                        Some(Ok(header)) => {
                            if tx.send(Ok(header)).await.is_err() {
                                // Consumer dropped without cancelling
                                return;
                            }
                            continue;
                        }
                        Some(Err(e)) => {
                            context.warn(&format!("Ignoring malformed header notification: {}", e));
                            continue;
                        }
                        None => continue,
                    },
                    Some(Ok(Message::Close(frame))) => {
                        RpcError::SubscriptionClosed(format!("server closed the socket: {:?}", frame))
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => RpcError::WebSocket(e.to_string()),
                    None => RpcError::SubscriptionClosed("stream ended".to_string()),
                };

                context.warn(&format!("Header subscription failed: {}", failure));
                let _ = tx.send(Err(failure)).await;
                return;
            }
        }
    }
}

/// `None` for messages that are not a notification of this subscription
pub(crate) fn parse_header_notification(
    text: &str,
    subscription_id: &str,
) -> Option<Result<BlockHeader, RpcError>> {
    let message: Value = serde_json::from_str(text).ok()?;
    if message.get("method").and_then(Value::as_str) != Some("eth_subscription") {
        return None;
    }
    let params = message.get("params")?;
    if params.get("subscription").and_then(Value::as_str) != Some(subscription_id) {
        return None;
    }

    Some(match params.get("result") {
        Some(result) => header_from_result(result),
        None => Err(RpcError::InvalidResponse("notification without result".to_string())),
    })
}

fn header_from_result(result: &Value) -> Result<BlockHeader, RpcError> {
    let number = result
        .get("number")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::InvalidResponse("header without number".to_string()))?;
    let hash = result
        .get("hash")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::InvalidResponse("header without hash".to_string()))?;

    Ok(BlockHeader {
        number: parse_hex_to_u64(number)?,
        hash: hash.to_string(),
    })
}

pub mod publisher;
pub mod redis_client;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::{Command, WalletNotification};

pub use publisher::RedisPublisher;
pub use redis_client::RedisClient;
pub use subscriber::CommandSubscriber;

/// Outbound side of the transport
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, notification: &WalletNotification) -> Result<(), TransportError>;
}

/// Receives each decoded inbound command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle_command(&self, command: Command);
}

pub fn decode_command(payload: &str) -> Result<Command, TransportError> {
    serde_json::from_str(payload).map_err(|e| TransportError::MalformedPayload(e.to_string()))
}

pub fn encode_notification(notification: &WalletNotification) -> Result<String, TransportError> {
    Ok(serde_json::to_string(notification)?)
}

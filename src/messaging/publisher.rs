use async_trait::async_trait;

use crate::error::TransportError;
use crate::logging::LogContext;
use crate::messaging::{encode_notification, NotificationPublisher, RedisClient};
use crate::models::WalletNotification;

/// Publishes notifications as JSON on the notification channel
pub struct RedisPublisher {
    client: RedisClient,
    channel: String,
}

impl RedisPublisher {
    pub fn new(client: RedisClient, channel: String) -> Self {
        Self { client, channel }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl NotificationPublisher for RedisPublisher {
    async fn publish(&self, notification: &WalletNotification) -> Result<(), TransportError> {
        let payload = encode_notification(notification)?;
        let receivers = self.client.publish(&self.channel, &payload).await?;

        if receivers == 0 {
            LogContext::new("redis_publisher", "publish")
                .with_wallet(notification.wallet_address.as_str())
                .with_transaction_hash(notification.transaction.hash.as_str())
                .debug(&format!("No subscribers on {}", self.channel));
        }
        Ok(())
    }
}

use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::RedisConfig;
use crate::error::TransportError;
use crate::logging::LogContext;

/// Shared Redis handle: a multiplexed connection for commands plus
/// dedicated connections for each subscription
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(config: &RedisConfig) -> Result<Self, TransportError> {
        LogContext::new("redis_client", "connect")
            .with_metadata("host", json!(config.host))
            .with_metadata("port", json!(config.port))
            .with_metadata("db", json!(config.db))
            .info("Connecting to Redis");

        let client = redis::Client::open(config.connection_url())?;
        let manager = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, manager })
    }

    pub async fn ping(&self) -> Result<(), TransportError> {
        let mut conn = self.manager.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply != "PONG" {
            return Err(TransportError::MalformedPayload(format!("unexpected PING reply: {}", reply)));
        }
        Ok(())
    }

    /// Returns the number of clients that received the message
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<usize, TransportError> {
        let mut conn = self.manager.clone();
        let receivers: usize = conn.publish(channel, payload).await?;
        Ok(receivers)
    }

    /// Deliver every payload on `channel` to `on_message` until `shutdown` fires.
    ///
    /// Returns an error if the subscription cannot be set up or the server
    /// closes it.
    pub async fn subscribe<F>(
        &self,
        channel: &str,
        shutdown: CancellationToken,
        mut on_message: F,
    ) -> Result<(), TransportError>
    where
        F: FnMut(String) + Send,
    {
        let context = LogContext::new("redis_client", "subscribe").with_metadata("channel", json!(channel));

        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        pubsub.subscribe(channel).await?;
        context.info(&format!("Subscribed to channel {}", channel));

        let mut messages = pubsub.on_message();
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    context.info("Subscription stopped");
                    return Ok(());
                }

                message = messages.next() => {
                    let message = match message {
                        Some(message) => message,
                        None => {
                            return Err(TransportError::SubscriptionClosed(format!(
                                "server closed subscription to {}",
                                channel
                            )))
                        }
                    };

                    match message.get_payload::<String>() {
                        Ok(payload) => on_message(payload),
                        Err(e) => context.warn(&format!("Dropping non-text payload: {}", e)),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_to_unreachable_server_fails() {
        let config = RedisConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            password: String::new(),
            db: 0,
        };

        let result = RedisClient::connect(&config).await;
        assert!(matches!(result, Err(TransportError::Redis(_))));
    }
}

use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::logging::LogContext;
use crate::messaging::{decode_command, CommandHandler, RedisClient};

/// Consumes the command channel and hands every command to the handler
pub struct CommandSubscriber {
    client: RedisClient,
    channel: String,
    handler: Arc<dyn CommandHandler>,
}

impl CommandSubscriber {
    pub fn new(client: RedisClient, channel: String, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            client,
            channel,
            handler,
        }
    }

    /// Runs until `shutdown` fires or the subscription fails
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), TransportError> {
        let handler = self.handler.clone();
        self.client
            .subscribe(&self.channel, shutdown, move |payload| {
                dispatch_payload(&payload, &handler);
            })
            .await
    }
}

/// Decode a payload and spawn its handler without waiting for it.
///
/// Malformed payloads are logged and dropped.
pub fn dispatch_payload(payload: &str, handler: &Arc<dyn CommandHandler>) -> Option<JoinHandle<()>> {
    match decode_command(payload) {
        Ok(command) => {
            LogContext::new("command_subscriber", "dispatch")
                .with_wallet(command.wallet_address.as_str())
                .with_user_id(command.user_id.0)
                .with_metadata("command_type", json!(command.command_type.as_str()))
                .debug("Received command");

            let handler = handler.clone();
            Some(tokio::spawn(async move { handler.handle_command(command).await }))
        }
        Err(e) => {
            LogContext::new("command_subscriber", "dispatch")
                .with_metadata("payload", json!(payload))
                .warn(&format!("Dropping malformed command: {}", e));
            None
        }
    }
}

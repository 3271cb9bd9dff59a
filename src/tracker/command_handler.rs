use async_trait::async_trait;
use serde_json::json;

use crate::logging::LogContext;
use crate::messaging::CommandHandler;
use crate::models::{Command, CommandType};
use crate::tracker::WalletTracker;

/// Routes inbound commands to the wallet tracker
#[derive(Clone)]
pub struct CommandDispatcher {
    tracker: WalletTracker,
}

impl CommandDispatcher {
    pub fn new(tracker: WalletTracker) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl CommandHandler for CommandDispatcher {
    async fn handle_command(&self, command: Command) {
        match command.command_type {
            CommandType::AddWallet => self.tracker.add_wallet(command.wallet_address, command.user_id),
            CommandType::RemoveWallet => self.tracker.remove_wallet(&command.wallet_address, command.user_id),
            CommandType::Unknown(kind) => {
                LogContext::new("command_dispatcher", "handle_command")
                    .with_wallet(command.wallet_address.as_str())
                    .with_user_id(command.user_id.0)
                    .with_metadata("command_type", json!(kind))
                    .warn("Ignoring unknown command type");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::mock::MockBlockSource;
    use crate::blockchain::{BlockProcessor, TokenResolver, TransferDetector};
    use crate::messaging::mock::MockPublisher;
    use crate::models::{UserId, WalletAddress};
    use std::sync::Arc;

    fn dispatcher() -> (CommandDispatcher, WalletTracker) {
        let source = Arc::new(MockBlockSource::new());
        let resolver = Arc::new(TokenResolver::new(source.clone(), "XPL".to_string()));
        let processor = Arc::new(BlockProcessor::new(source.clone(), TransferDetector::new(resolver), 10));
        let tracker = WalletTracker::new(source, processor, Arc::new(MockPublisher::default()), 8);
        (CommandDispatcher::new(tracker.clone()), tracker)
    }

    fn wallet() -> WalletAddress {
        WalletAddress::parse("0xf977814e90da44bfa03b6295a0616a897441acec").unwrap()
    }

    #[tokio::test]
    async fn test_add_and_remove_commands() {
        let (dispatcher, tracker) = dispatcher();

        dispatcher.handle_command(Command::add_wallet(wallet(), UserId(4))).await;
        assert_eq!(tracker.subscribers(&wallet()), vec![UserId(4)]);
        assert!(tracker.is_watching(&wallet()));

        dispatcher.handle_command(Command::remove_wallet(wallet(), UserId(4))).await;
        assert!(!tracker.is_watching(&wallet()));
    }

    #[tokio::test]
    async fn test_unknown_command_mutates_nothing() {
        let (dispatcher, tracker) = dispatcher();

        let mut command = Command::add_wallet(wallet(), UserId(4));
        command.command_type = CommandType::Unknown("foo".to_string());
        dispatcher.handle_command(command).await;

        assert_eq!(tracker.listener_count(), 0);
        assert!(tracker.subscribers(&wallet()).is_empty());
    }
}

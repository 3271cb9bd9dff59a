use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::wallet::{UserId, WalletAddress};

/// Inbound wallet management command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    #[serde(rename = "type")]
    pub command_type: CommandType,
    pub wallet_address: WalletAddress,
    pub user_id: UserId,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Command {
    pub fn add_wallet(wallet_address: WalletAddress, user_id: UserId) -> Self {
        Self {
            command_type: CommandType::AddWallet,
            wallet_address,
            user_id,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn remove_wallet(wallet_address: WalletAddress, user_id: UserId) -> Self {
        Self {
            command_type: CommandType::RemoveWallet,
            wallet_address,
            user_id,
            timestamp: Some(Utc::now()),
        }
    }
}

/// Command kind. Unrecognised kinds decode into `Unknown` so the dispatcher
/// can log and drop them instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandType {
    AddWallet,
    RemoveWallet,
    Unknown(String),
}

impl CommandType {
    pub fn as_str(&self) -> &str {
        match self {
            CommandType::AddWallet => "add_wallet",
            CommandType::RemoveWallet => "remove_wallet",
            CommandType::Unknown(raw) => raw,
        }
    }
}

impl From<String> for CommandType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "add_wallet" => CommandType::AddWallet,
            "remove_wallet" => CommandType::RemoveWallet,
            _ => CommandType::Unknown(raw),
        }
    }
}

impl From<CommandType> for String {
    fn from(command_type: CommandType) -> Self {
        command_type.as_str().to_string()
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::{ConfigError, TransportError, ValidationError};
use crate::messaging::RedisClient;
use crate::models::{Command, UserId, WalletAddress};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Operator tool for the wallet tracker
#[derive(Parser, Debug)]
#[command(name = "cli", version, about = "Manage wallets watched by the Plasma wallet tracker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Subscribe a user to a wallet
    AddWallet {
        #[arg(long)]
        address: String,
        #[arg(long)]
        user_id: i64,
    },
    /// Unsubscribe a user from a wallet
    RemoveWallet {
        #[arg(long)]
        address: String,
        #[arg(long)]
        user_id: i64,
    },
    /// Print a configuration file with every default filled in
    SampleConfig,
}

impl Commands {
    /// The command to publish, or `None` for local-only subcommands
    pub fn to_command(&self) -> Result<Option<Command>, CliError> {
        let command = match self {
            Commands::AddWallet { address, user_id } => {
                Command::add_wallet(WalletAddress::parse(address)?, UserId(*user_id))
            }
            Commands::RemoveWallet { address, user_id } => {
                Command::remove_wallet(WalletAddress::parse(address)?, UserId(*user_id))
            }
            Commands::SampleConfig => return Ok(None),
        };
        Ok(Some(command))
    }
}

pub struct CliHandler {
    config: AppConfig,
}

impl CliHandler {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn execute_command(&self, command: &Commands) -> Result<(), CliError> {
        let Some(command) = command.to_command()? else {
            println!("{}", AppConfig::generate_sample_config()?);
            return Ok(());
        };

        let payload = serde_json::to_string(&command).map_err(TransportError::from)?;
        let client = RedisClient::connect(&self.config.redis).await?;
        let receivers = client.publish(&self.config.service.command_channel, &payload).await?;

        println!(
            "Published {} for {} (user {}) to '{}'",
            command.command_type.as_str(),
            command.wallet_address,
            command.user_id.0,
            self.config.service.command_channel
        );
        if receivers == 0 {
            println!("Warning: no tracker is subscribed to the command channel");
        }
        Ok(())
    }
}

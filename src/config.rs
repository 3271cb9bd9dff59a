use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub redis: RedisConfig,
    pub blockchain: BlockchainConfig,
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// Pub/sub transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Empty means no AUTH
    pub password: String,
    pub db: i64,
}

/// Node connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainConfig {
    /// HTTP JSON-RPC endpoint for pull operations
    pub rpc_url: String,
    /// WebSocket endpoint for header subscriptions
    pub ws_url: String,
    /// Expected chain id, checked against the node at startup
    pub chain_id: u64,
    /// Maximum receipt fetches in flight per block scan
    pub batch_size: usize,
    pub request_timeout_seconds: u64,
    pub native_symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub command_channel: String,
    pub notification_channel: String,
    /// Tokio runtime worker threads
    pub worker_count: usize,
    /// Per-listener hand-off capacity
    pub notification_buffer: usize,
}

/// HTTP health server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl RedisConfig {
    /// `redis://[:password@]host:port/db`
    pub fn connection_url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://rpc.plasma.network".to_string(),
            ws_url: "wss://ws.plasma.network".to_string(),
            chain_id: 9745,
            batch_size: 100,
            request_timeout_seconds: 30,
            native_symbol: "XPL".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command_channel: "wallet_commands".to_string(),
            notification_channel: "wallet_notifications".to_string(),
            worker_count: 10,
            notification_buffer: 100,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(raw) = env::var(key) {
        *target = raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        })?;
    }
    Ok(())
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    /// Environment variables take precedence over file values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file; a missing file yields defaults
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::FileNotFound(config_path.clone()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Redis
        if let Ok(host) = env::var("REDIS_HOST") {
            self.redis.host = host;
        }
        parse_env("REDIS_PORT", &mut self.redis.port)?;
        if let Ok(password) = env::var("REDIS_PASSWORD") {
            self.redis.password = password;
        }
        parse_env("REDIS_DB", &mut self.redis.db)?;

        // Blockchain
        if let Ok(url) = env::var("BLOCKCHAIN_RPC_URL") {
            self.blockchain.rpc_url = url;
        }
        if let Ok(url) = env::var("BLOCKCHAIN_WS_URL") {
            self.blockchain.ws_url = url;
        }
        parse_env("BLOCKCHAIN_CHAIN_ID", &mut self.blockchain.chain_id)?;
        parse_env("BLOCKCHAIN_BATCH_SIZE", &mut self.blockchain.batch_size)?;
        parse_env("BLOCKCHAIN_REQUEST_TIMEOUT", &mut self.blockchain.request_timeout_seconds)?;
        if let Ok(symbol) = env::var("BLOCKCHAIN_NATIVE_SYMBOL") {
            self.blockchain.native_symbol = symbol;
        }

        // Service
        if let Ok(channel) = env::var("SERVICE_COMMAND_CHANNEL") {
            self.service.command_channel = channel;
        }
        if let Ok(channel) = env::var("SERVICE_NOTIFICATION_CHANNEL") {
            self.service.notification_channel = channel;
        }
        parse_env("SERVICE_WORKER_COUNT", &mut self.service.worker_count)?;
        parse_env("SERVICE_NOTIFICATION_BUFFER", &mut self.service.notification_buffer)?;

        // API
        if let Ok(host) = env::var("API_HOST") {
            self.api.host = host;
        }
        parse_env("API_PORT", &mut self.api.port)?;

        // Logging
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format.to_lowercase();
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rpc_url = &self.blockchain.rpc_url;
        if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(rpc_url.clone()));
        }

        let ws_url = &self.blockchain.ws_url;
        if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
            return Err(ConfigError::InvalidUrl(ws_url.clone()));
        }

        if self.blockchain.batch_size == 0 || self.blockchain.batch_size > 1000 {
            return Err(invalid("blockchain.batch_size", self.blockchain.batch_size));
        }

        if self.blockchain.request_timeout_seconds == 0 || self.blockchain.request_timeout_seconds > 300 {
            return Err(invalid(
                "blockchain.request_timeout_seconds",
                self.blockchain.request_timeout_seconds,
            ));
        }

        if self.blockchain.native_symbol.trim().is_empty() {
            return Err(invalid("blockchain.native_symbol", &self.blockchain.native_symbol));
        }

        if self.service.worker_count == 0 || self.service.worker_count > 512 {
            return Err(invalid("service.worker_count", self.service.worker_count));
        }

        if self.service.notification_buffer == 0 {
            return Err(invalid("service.notification_buffer", self.service.notification_buffer));
        }

        if self.service.command_channel.trim().is_empty() {
            return Err(invalid("service.command_channel", &self.service.command_channel));
        }
        if self.service.notification_channel.trim().is_empty() {
            return Err(invalid("service.notification_channel", &self.service.notification_channel));
        }

        if self.redis.host.trim().is_empty() {
            return Err(invalid("redis.host", &self.redis.host));
        }

        if self.api.port == 0 {
            return Err(invalid("api.port", self.api.port));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid("logging.level", &self.logging.level));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid("logging.format", &self.logging.format));
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}

use thiserror::Error;

/// Main error type for the wallet tracker
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("System error: {0}")]
    System(#[from] SystemError),
}

/// Errors talking to the blockchain node
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i32, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),
}

/// Errors talking to the pub/sub transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),
}

/// Errors decoding chain data
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Block parsing failed: {0}")]
    BlockParsing(String),

    #[error("Transaction parsing failed: {0}")]
    TransactionParsing(String),

    #[error("Log parsing failed: {0}")]
    LogParsing(String),

    #[error("Amount parsing failed: {0}")]
    AmountParsing(String),

    #[error("ABI decoding failed: {0}")]
    AbiDecoding(String),

    #[error("Transaction is pending: {0}")]
    PendingTransaction(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("Chain id mismatch: configured={configured}, node={node}")]
    ChainIdMismatch { configured: u64, node: u64 },
}

/// Validation errors for identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTransactionHash(String),
}

/// System-level errors
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Signal handling failed: {0}")]
    Signal(String),

    #[error("Retries exhausted: {0}")]
    RetriesExhausted(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Fatal at startup
    Critical,
    /// Affects a listener or the command path
    High,
    /// Skipped item, degraded result
    Medium,
    /// Mostly informational
    Low,
}

impl TrackerError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrackerError::Config(_) => ErrorSeverity::Critical,
            TrackerError::System(SystemError::Io(_)) => ErrorSeverity::Critical,

            TrackerError::Rpc(RpcError::Connection(_)) => ErrorSeverity::High,
            TrackerError::Rpc(RpcError::WebSocket(_)) => ErrorSeverity::High,
            TrackerError::Rpc(RpcError::SubscriptionClosed(_)) => ErrorSeverity::High,
            TrackerError::Transport(TransportError::Redis(_)) => ErrorSeverity::High,

            TrackerError::Rpc(RpcError::Timeout { .. }) => ErrorSeverity::Medium,
            TrackerError::Processing(_) => ErrorSeverity::Medium,

            TrackerError::Validation(_) => ErrorSeverity::Low,
            TrackerError::Rpc(RpcError::NotFound(_)) => ErrorSeverity::Low,
            TrackerError::Transport(TransportError::MalformedPayload(_)) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }

    /// Check if the error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            TrackerError::Rpc(RpcError::Timeout { .. }) => true,
            TrackerError::Rpc(RpcError::Connection(_)) => true,
            TrackerError::Rpc(RpcError::Http(_)) => true,
            TrackerError::Rpc(RpcError::WebSocket(_)) => true,
            TrackerError::Transport(TransportError::Redis(e)) => {
                e.is_io_error() || e.is_connection_refusal() || e.is_timeout()
            }

            TrackerError::Config(_) => false,
            TrackerError::Validation(_) => false,
            _ => false,
        }
    }
}

impl From<redis::RedisError> for TrackerError {
    fn from(err: redis::RedisError) -> Self {
        TrackerError::Transport(TransportError::Redis(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let critical = TrackerError::Config(ConfigError::Parsing("bad".to_string()));
        assert_eq!(critical.severity(), ErrorSeverity::Critical);

        let high = TrackerError::Rpc(RpcError::SubscriptionClosed("eof".to_string()));
        assert_eq!(high.severity(), ErrorSeverity::High);

        let medium = TrackerError::Rpc(RpcError::Timeout { seconds: 30 });
        assert_eq!(medium.severity(), ErrorSeverity::Medium);

        let low = TrackerError::Validation(ValidationError::InvalidAddress("0x12".to_string()));
        assert_eq!(low.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_error_recoverability() {
        assert!(TrackerError::Rpc(RpcError::Connection("refused".to_string())).is_recoverable());
        assert!(!TrackerError::Config(ConfigError::InvalidUrl("x".to_string())).is_recoverable());
        assert!(!TrackerError::Rpc(RpcError::Method { code: -32601, message: "nope".to_string() })
            .is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = TrackerError::Rpc(RpcError::Method {
            code: -32601,
            message: "Method not found".to_string(),
        });
        assert_eq!(
            format!("{}", error),
            "RPC error: RPC method error: code=-32601, message=Method not found"
        );

        let mismatch = ConfigError::ChainIdMismatch { configured: 9745, node: 1 };
        assert_eq!(mismatch.to_string(), "Chain id mismatch: configured=9745, node=1");
    }
}

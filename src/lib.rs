pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod retry;
pub mod tracker;

pub use blockchain::{BlockProcessor, BlockSource, NodeClient, RpcClient, TokenResolver, TransferDetector};
pub use config::{ApiConfig, AppConfig, BlockchainConfig, LoggingConfig, RedisConfig, ServiceConfig};
pub use error::{Result, TrackerError};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use messaging::{CommandHandler, NotificationPublisher};
pub use retry::{RetryConfig, RetryManager, RetryUtils};
pub use tracker::{CommandDispatcher, WalletTracker};

use log::{error, info};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use plasma_wallet_tracker::api::{ApiServer, AppState};
use plasma_wallet_tracker::blockchain::{BlockProcessor, BlockSource, NodeClient, TokenResolver, TransferDetector};
use plasma_wallet_tracker::config::AppConfig;
use plasma_wallet_tracker::error::{ConfigError, SystemError, TrackerError};
use plasma_wallet_tracker::logging::{init_logging, ErrorLogger, LogContext};
use plasma_wallet_tracker::messaging::{CommandSubscriber, RedisClient, RedisPublisher};
use plasma_wallet_tracker::retry::RetryUtils;
use plasma_wallet_tracker::tracker::{CommandDispatcher, WalletTracker};

const HEADER_BUFFER: usize = 64;

fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.service.worker_count)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        ErrorLogger::log_error(&e, Some(LogContext::new("main", "run")));
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), TrackerError> {
    info!("Starting Plasma wallet tracker");

    let redis = RetryUtils::retry_startup("redis_connect", || async {
        let client = RedisClient::connect(&config.redis).await?;
        client.ping().await?;
        Ok(client)
    })
    .await?;

    let node = Arc::new(NodeClient::from_config(&config.blockchain, HEADER_BUFFER)?);
    verify_node(&node, config.blockchain.chain_id).await?;

    let source: Arc<dyn BlockSource> = node.clone();
    let resolver = Arc::new(TokenResolver::new(source.clone(), config.blockchain.native_symbol.clone()));
    let processor = Arc::new(BlockProcessor::new(
        source.clone(),
        TransferDetector::new(resolver),
        config.blockchain.batch_size,
    ));
    let publisher = Arc::new(RedisPublisher::new(
        redis.clone(),
        config.service.notification_channel.clone(),
    ));
    let tracker = WalletTracker::new(source, processor, publisher, config.service.notification_buffer);
    let subscriber = CommandSubscriber::new(
        redis.clone(),
        config.service.command_channel.clone(),
        Arc::new(CommandDispatcher::new(tracker.clone())),
    );

    let shutdown = CancellationToken::new();

    let api = ApiServer::new(
        AppState { redis: Arc::new(redis), node: node.clone() },
        config.api.host.clone(),
        config.api.port,
    );
    let api_shutdown = shutdown.clone();
    let api_task = tokio::spawn(async move {
        if let Err(e) = api.start(api_shutdown).await {
            LogContext::new("main", "http").with_error(&e).error("HTTP server failed");
        }
    });

    let subscriber_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match subscriber.run(subscriber_shutdown).await {
            Ok(()) => LogContext::new("main", "command_subscriber").info("Command subscriber stopped"),
            Err(e) => LogContext::new("main", "command_subscriber")
                .with_error(&e)
                .error("Command subscriber failed, commands are no longer accepted"),
        }
    });

    let tracker_task = {
        let tracker = tracker.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { tracker.run(shutdown).await })
    };

    wait_for_signal().await?;
    info!("Shutting down gracefully...");
    shutdown.cancel();

    let _ = tokio::join!(tracker_task, api_task);
    info!("Shutdown complete");
    Ok(())
}

/// Chain id must match the configuration and the latest block must be readable
async fn verify_node(node: &Arc<NodeClient>, expected_chain_id: u64) -> Result<(), TrackerError> {
    let chain_id = RetryUtils::retry_startup("node_chain_id", || async { Ok(node.chain_id().await?) }).await?;
    if chain_id != expected_chain_id {
        return Err(ConfigError::ChainIdMismatch { configured: expected_chain_id, node: chain_id }.into());
    }

    let latest = RetryUtils::retry_startup("node_latest_block", || async { Ok(node.latest_block().await?) }).await?;

    LogContext::new("main", "verify_node")
        .with_block_number(latest.number)
        .with_metadata("chain_id", json!(chain_id))
        .info("Connected to blockchain node");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<(), TrackerError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| SystemError::Signal(e.to_string()))?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map_err(|e| SystemError::Signal(e.to_string()))?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<(), TrackerError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| SystemError::Signal(e.to_string()))?;
    Ok(())
}

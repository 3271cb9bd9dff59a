use log::{debug, error, info, trace, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, TrackerError};

/// Structured logging context for the tracker
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_wallet(self, wallet: &str) -> Self {
        self.with_metadata("wallet_address", json!(wallet))
    }

    pub fn with_user_id(self, user_id: i64) -> Self {
        self.with_metadata("user_id", json!(user_id))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    pub fn with_error(self, error: &dyn std::fmt::Display) -> Self {
        self.with_metadata("error", json!(error.to_string()))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Performance monitoring utilities
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    fn elapsed_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Elapsed time without emitting a log line
    pub fn finish_quiet(self) -> u64 {
        self.elapsed_ms()
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();

        let mut context = LogContext::new("performance", &self.operation).with_duration_ms(duration);
        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }

        match result {
            Ok(_) => context.debug(&format!("Operation completed successfully in {}ms", duration)),
            Err(e) => {
                context = context.with_error(e);
                context.warn(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &TrackerError, context: Option<LogContext>) {
        let severity = error.severity();

        let log_context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_context.error(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.info(&message),
        }
    }

    pub fn log_retry_attempt(operation: &str, error: &dyn std::fmt::Display, attempt: u32, max_attempts: u32) {
        let context = LogContext::new("recovery", "retry_attempt")
            .with_metadata("operation", json!(operation))
            .with_retry_count(attempt)
            .with_metadata("max_attempts", json!(max_attempts))
            .with_error(error);

        if attempt >= max_attempts {
            context.error(&format!("Final attempt of {} failed: {}", operation, error));
        } else {
            context.warn(&format!("Attempt {} of {} for {} failed: {}", attempt, max_attempts, operation, error));
        }
    }
}

/// Application metrics emitted as log lines
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_block_scanned(wallet: &str, block_number: u64, matches: usize, processing_time_ms: u64) {
        let context = LogContext::new("metrics", "block_scanned")
            .with_wallet(wallet)
            .with_block_number(block_number)
            .with_metadata("matching_transactions", json!(matches))
            .with_duration_ms(processing_time_ms);

        if matches > 0 {
            context.info(&format!("Block {} has {} transactions for {}", block_number, matches, wallet));
        } else {
            context.debug(&format!("Block {} scanned for {}", block_number, wallet));
        }
    }

    pub fn log_notification_published(wallet: &str, tx_hash: &str, subscriber_count: usize) {
        LogContext::new("metrics", "notification_published")
            .with_wallet(wallet)
            .with_transaction_hash(tx_hash)
            .with_metadata("subscriber_count", json!(subscriber_count))
            .info(&format!("Published notification for {} to {} subscribers", wallet, subscriber_count));
    }

    pub fn log_notification_dropped(wallet: &str, tx_hash: &str, reason: &str) {
        LogContext::new("metrics", "notification_dropped")
            .with_wallet(wallet)
            .with_transaction_hash(tx_hash)
            .with_metadata("reason", json!(reason))
            .warn(&format!("Dropped activity for {}: {}", wallet, reason));
    }

    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_listener_count(active_listeners: usize) {
        LogContext::new("metrics", "listener_count")
            .with_metadata("active_listeners", json!(active_listeners))
            .info(&format!("{} active wallet listeners", active_listeners));
    }
}

/// Initialize structured logging.
///
/// `RUST_LOG` still takes precedence over the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pretty = config.format == "pretty";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.level.as_str()))
        .format(move |buf, record| {
            use std::io::Write;

            let line = record.args().to_string();
            match serde_json::from_str::<Value>(&line) {
                Ok(json_value) if pretty => writeln!(buf, "{}", serde_json::to_string_pretty(&json_value)?),
                Ok(_) => writeln!(buf, "{}", line),
                // Plain messages from dependencies
                Err(_) if pretty => writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    line
                ),
                Err(_) => writeln!(
                    buf,
                    "{}",
                    json!({
                        "timestamp": chrono::Utc::now().timestamp(),
                        "level": record.level().to_string(),
                        "component": record.target(),
                        "message": line,
                    })
                ),
            }
        })
        .try_init()?;

    info!("Structured logging initialized");
    Ok(())
}

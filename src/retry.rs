use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{SystemError, TrackerError};
use crate::logging::{ErrorLogger, LogContext, PerformanceMonitor};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Initial delay between retries in seconds
    pub initial_delay_seconds: u64,
    /// Maximum delay between retries in seconds
    pub max_delay_seconds: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_seconds: 1,
            max_delay_seconds: 60,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Startup connectivity checks: two attempts, then give up
    pub fn for_startup() -> Self {
        Self {
            max_attempts: 2,
            initial_delay_seconds: 1,
            max_delay_seconds: 5,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry mechanism with exponential backoff and jitter
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    /// Execute an operation, retrying recoverable errors until attempts run out.
    ///
    /// The whole run, delays included, is timed and logged once it settles.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, TrackerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TrackerError>>,
    {
        let monitor = PerformanceMonitor::new(&format!("retry_{}", self.operation_name))
            .with_metadata("max_attempts", json!(self.config.max_attempts));
        let result = self.attempt_all(operation).await;
        monitor.finish_with_result(&result);
        result
    }

    async fn attempt_all<T, F, Fut>(&self, operation: F) -> Result<T, TrackerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TrackerError>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.config.max_attempts {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        LogContext::new("retry", &self.operation_name)
                            .with_retry_count(attempt)
                            .info(&format!("{} succeeded after {} attempts", self.operation_name, attempt));
                    }
                    return Ok(result);
                }
                Err(error) => {
                    ErrorLogger::log_retry_attempt(&self.operation_name, &error, attempt, self.config.max_attempts);

                    if !error.is_recoverable() {
                        LogContext::new("retry", &self.operation_name)
                            .with_retry_count(attempt)
                            .with_metadata("reason", json!("non_recoverable"))
                            .error(&format!("Non-recoverable error, aborting retries: {}", error));
                        return Err(error);
                    }

                    if attempt < self.config.max_attempts {
                        let delay = self.calculate_delay(attempt);
                        LogContext::new("retry", &self.operation_name)
                            .with_retry_count(attempt)
                            .with_metadata("delay_ms", json!(delay.as_millis() as u64))
                            .info(&format!(
                                "Retrying in {}ms (attempt {} of {})",
                                delay.as_millis(),
                                attempt,
                                self.config.max_attempts
                            ));
                        sleep(delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TrackerError::System(SystemError::RetriesExhausted(format!(
                "{} was attempted zero times",
                self.operation_name
            )))
        }))
    }

    /// Calculate delay for the given attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay_seconds as f64;
        let exponential_delay = base_delay * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_delay = exponential_delay.min(self.config.max_delay_seconds as f64);

        let final_delay = if self.config.jitter {
            let jitter_factor = 0.1; // 10% jitter
            let jitter = capped_delay * jitter_factor * (rand::random::<f64>() - 0.5);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Convenience functions for common retry patterns
pub struct RetryUtils;

impl RetryUtils {
    /// Retry a startup connectivity check
    pub async fn retry_startup<T, F, Fut>(operation_name: &str, operation: F) -> Result<T, TrackerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TrackerError>>,
    {
        RetryManager::new(operation_name, RetryConfig::for_startup())
            .execute(operation)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, RpcError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn immediate(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_seconds: 0,
            max_delay_seconds: 0,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_startup_preset() {
        let config = RetryConfig::for_startup();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.max_delay_seconds, 5);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let manager = RetryManager::new("test_operation", immediate(2));

        let counter = calls.clone();
        let result = manager
            .execute(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(TrackerError::Rpc(RpcError::Connection("refused".to_string())))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let manager = RetryManager::new("test_operation", immediate(2));

        let counter = calls.clone();
        let result: Result<(), _> = manager
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TrackerError::Rpc(RpcError::Timeout { seconds: 1 }))
                }
            })
            .await;

        assert!(matches!(result, Err(TrackerError::Rpc(RpcError::Timeout { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_recoverable_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let manager = RetryManager::new("test_operation", immediate(3));

        let counter = calls.clone();
        let result: Result<(), _> = manager
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TrackerError::Config(ConfigError::ChainIdMismatch { configured: 1, node: 2 }))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay_seconds: 2,
            max_delay_seconds: 30,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        let manager = RetryManager::new("test", config);

        assert_eq!(manager.calculate_delay(1).as_secs(), 2);
        assert_eq!(manager.calculate_delay(2).as_secs(), 4);
        assert_eq!(manager.calculate_delay(3).as_secs(), 8);
        assert_eq!(manager.calculate_delay(6).as_secs(), 30);
    }
}

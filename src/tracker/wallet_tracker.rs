use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::blockchain::{BlockProcessor, BlockSource};
use crate::logging::{LogContext, MetricsLogger};
use crate::messaging::NotificationPublisher;
use crate::models::{UserId, WalletAddress};
use crate::tracker::listener::{run_listener, ListenerContext};

/// How long shutdown waits for listener tasks to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub(crate) struct ListenerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Subscription state. Only touched under the tracker lock, never across I/O.
#[derive(Default)]
pub(crate) struct TrackerState {
    subscribers: HashMap<WalletAddress, Vec<UserId>>,
    listeners: HashMap<WalletAddress, ListenerHandle>,
}

pub(crate) type SharedState = Arc<Mutex<TrackerState>>;

pub(crate) fn lock_state(state: &SharedState) -> MutexGuard<'_, TrackerState> {
    // A panic while holding the lock cannot leave the maps half-updated
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshot of the current subscribers of `wallet`
pub(crate) fn snapshot_subscribers(state: &SharedState, wallet: &WalletAddress) -> Vec<UserId> {
    lock_state(state).subscribers.get(wallet).cloned().unwrap_or_default()
}

/// Owns the watched wallets, their subscribers, and one listener task per wallet.
///
/// A listener starts when a wallet gains its first subscriber and is cancelled
/// when it loses its last one. Subscribing the same user twice is kept as two
/// entries; each removal drops one.
#[derive(Clone)]
pub struct WalletTracker {
    source: Arc<dyn BlockSource>,
    processor: Arc<BlockProcessor>,
    publisher: Arc<dyn NotificationPublisher>,
    state: SharedState,
    root: CancellationToken,
    notification_buffer: usize,
}

impl WalletTracker {
    pub fn new(
        source: Arc<dyn BlockSource>,
        processor: Arc<BlockProcessor>,
        publisher: Arc<dyn NotificationPublisher>,
        notification_buffer: usize,
    ) -> Self {
        Self {
            source,
            processor,
            publisher,
            state: Arc::new(Mutex::new(TrackerState::default())),
            root: CancellationToken::new(),
            notification_buffer: notification_buffer.max(1),
        }
    }

    pub fn add_wallet(&self, wallet: WalletAddress, user: UserId) {
        let context = LogContext::new("wallet_tracker", "add_wallet")
            .with_wallet(wallet.as_str())
            .with_user_id(user.0);

        let mut state = lock_state(&self.state);
        let subscribers = state.subscribers.entry(wallet.clone()).or_default();
        subscribers.push(user);
        let subscriber_count = subscribers.len();

        if subscriber_count == 1 {
            let token = self.root.child_token();
            let task = tokio::spawn(run_listener(self.listener_context(wallet.clone()), token.clone()));
            state.listeners.insert(wallet, ListenerHandle { token, task });
            let listener_count = state.listeners.len();
            drop(state);

            context.info("Started listener for wallet");
            MetricsLogger::log_listener_count(listener_count);
        } else {
            drop(state);
            context
                .with_metadata("subscriber_count", json!(subscriber_count))
                .info("Added subscriber to watched wallet");
        }
    }

    /// Removes one subscription of `user`. Unknown wallets and users are ignored.
    pub fn remove_wallet(&self, wallet: &WalletAddress, user: UserId) {
        let context = LogContext::new("wallet_tracker", "remove_wallet")
            .with_wallet(wallet.as_str())
            .with_user_id(user.0);

        let mut state = lock_state(&self.state);
        let Some(subscribers) = state.subscribers.get_mut(wallet) else {
            drop(state);
            context.debug("Wallet is not watched");
            return;
        };

        match subscribers.iter().position(|existing| *existing == user) {
            Some(position) => {
                subscribers.remove(position);
            }
            None => {
                drop(state);
                context.debug("User is not subscribed to wallet");
                return;
            }
        }

        if !subscribers.is_empty() {
            let remaining = subscribers.len();
            drop(state);
            context
                .with_metadata("subscriber_count", json!(remaining))
                .info("Removed subscriber from watched wallet");
            return;
        }

        state.subscribers.remove(wallet);
        if let Some(handle) = state.listeners.remove(wallet) {
            handle.token.cancel();
        }
        let listener_count = state.listeners.len();
        drop(state);

        context.info("Stopped listener for wallet");
        MetricsLogger::log_listener_count(listener_count);
    }

    pub fn subscribers(&self, wallet: &WalletAddress) -> Vec<UserId> {
        snapshot_subscribers(&self.state, wallet)
    }

    pub fn is_watching(&self, wallet: &WalletAddress) -> bool {
        lock_state(&self.state).listeners.contains_key(wallet)
    }

    pub fn watched_wallets(&self) -> Vec<WalletAddress> {
        let mut wallets: Vec<_> = lock_state(&self.state).listeners.keys().cloned().collect();
        wallets.sort();
        wallets
    }

    pub fn listener_count(&self) -> usize {
        lock_state(&self.state).listeners.len()
    }

    /// Cancel every listener and forget all subscriptions
    pub fn stop_all(&self) -> Vec<JoinHandle<()>> {
        let mut state = lock_state(&self.state);
        state.subscribers.clear();
        let tasks: Vec<_> = state
            .listeners
            .drain()
            .map(|(_, handle)| {
                handle.token.cancel();
                handle.task
            })
            .collect();
        drop(state);

        LogContext::new("wallet_tracker", "stop_all")
            .with_metadata("stopped_listeners", json!(tasks.len()))
            .info("Stopped all listeners");
        tasks
    }

    /// Wait for `shutdown`, then stop everything
    pub async fn run(&self, shutdown: CancellationToken) {
        LogContext::new("wallet_tracker", "run").info("Wallet tracker started");
        shutdown.cancelled().await;
        self.shutdown().await;
    }

    pub async fn shutdown(&self) {
        self.root.cancel();
        let tasks = self.stop_all();
        let joined = tokio::time::timeout(SHUTDOWN_GRACE, futures_util::future::join_all(tasks)).await;
        if joined.is_err() {
            LogContext::new("wallet_tracker", "shutdown").warn("Listeners did not stop within the grace period");
        }
    }

    fn listener_context(&self, wallet: WalletAddress) -> ListenerContext {
        ListenerContext {
            wallet,
            source: self.source.clone(),
            processor: self.processor.clone(),
            publisher: self.publisher.clone(),
            state: self.state.clone(),
            buffer: self.notification_buffer,
        }
    }
}

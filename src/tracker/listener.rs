use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::blockchain::{BlockProcessor, BlockSource, HeaderSubscription, WalletActivity};
use crate::logging::{LogContext, MetricsLogger};
use crate::messaging::NotificationPublisher;
use crate::models::{WalletAddress, WalletNotification};
use crate::tracker::wallet_tracker::{snapshot_subscribers, SharedState};

/// Everything one wallet's listener needs
pub(crate) struct ListenerContext {
    pub(crate) wallet: WalletAddress,
    pub(crate) source: Arc<dyn BlockSource>,
    pub(crate) processor: Arc<BlockProcessor>,
    pub(crate) publisher: Arc<dyn NotificationPublisher>,
    pub(crate) state: SharedState,
    pub(crate) buffer: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum HandOff {
    Queued,
    Dropped(&'static str),
}

/// Queue without waiting; the newest item is dropped when the queue is full
pub(crate) fn hand_off<T>(queue: &mpsc::Sender<T>, item: T) -> HandOff {
    match queue.try_send(item) {
        Ok(()) => HandOff::Queued,
        Err(mpsc::error::TrySendError::Full(_)) => HandOff::Dropped("notification buffer full"),
        Err(mpsc::error::TrySendError::Closed(_)) => HandOff::Dropped("notification consumer stopped"),
    }
}

/// Listener task for one wallet.
///
/// Scans every new block for the wallet and publishes what it finds. Exits on
/// cancellation or when the header subscription fails; it is not restarted.
pub(crate) async fn run_listener(ctx: ListenerContext, token: CancellationToken) {
    let context = LogContext::new("listener", "run").with_wallet(ctx.wallet.as_str());

    let subscription = tokio::select! {
        _ = token.cancelled() => return,
        subscription = ctx.source.subscribe_new_heads() => subscription,
    };
    let subscription = match subscription {
        Ok(subscription) => subscription,
        Err(e) => {
            context.with_error(&e).warn("Header subscription failed, wallet is no longer monitored");
            return;
        }
    };
    context.debug("Listening for new blocks");

    let (queue, pending) = mpsc::channel(ctx.buffer);
    tokio::join!(
        scan_blocks(&ctx, subscription, queue, &token),
        publish_activity(&ctx, pending, &token),
    );

    context.debug("Listener stopped");
}

async fn scan_blocks(
    ctx: &ListenerContext,
    mut subscription: HeaderSubscription,
    queue: mpsc::Sender<WalletActivity>,
    token: &CancellationToken,
) {
    loop {
        let item = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            item = subscription.next() => item,
        };

        let header = match item {
            Some(Ok(header)) => header,
            Some(Err(e)) => {
                LogContext::new("listener", "scan_blocks")
                    .with_wallet(ctx.wallet.as_str())
                    .with_error(&e)
                    .warn("Header subscription failed, wallet is no longer monitored");
                return;
            }
            None => {
                LogContext::new("listener", "scan_blocks")
                    .with_wallet(ctx.wallet.as_str())
                    .warn("Header subscription ended, wallet is no longer monitored");
                return;
            }
        };

        let scanned = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            scanned = ctx.processor.process_block(&header, &ctx.wallet) => scanned,
        };

        let activities = match scanned {
            Ok(activities) => activities,
            Err(e) => {
                LogContext::new("listener", "scan_blocks")
                    .with_wallet(ctx.wallet.as_str())
                    .with_block_number(header.number)
                    .with_error(&e)
                    .warn("Block scan failed, skipping block");
                continue;
            }
        };

        for activity in activities {
            let tx_hash = activity.transaction.hash.to_string();
            if let HandOff::Dropped(reason) = hand_off(&queue, activity) {
                MetricsLogger::log_notification_dropped(ctx.wallet.as_str(), &tx_hash, reason);
            }
        }
    }
}

async fn publish_activity(
    ctx: &ListenerContext,
    mut pending: mpsc::Receiver<WalletActivity>,
    token: &CancellationToken,
) {
    loop {
        let activity = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            activity = pending.recv() => match activity {
                Some(activity) => activity,
                None => return,
            },
        };

        let subscribers = snapshot_subscribers(&ctx.state, &ctx.wallet);
        if subscribers.is_empty() {
            LogContext::new("listener", "publish_activity")
                .with_wallet(ctx.wallet.as_str())
                .debug("Wallet has no subscribers left, skipping notification");
            continue;
        }

        let subscriber_count = subscribers.len();
        let notification = WalletNotification {
            wallet_address: ctx.wallet.clone(),
            transaction: activity.transaction,
            transfers: activity.transfers,
            subscribers,
            timestamp: Utc::now(),
        };

        let published = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            published = ctx.publisher.publish(&notification) => published,
        };

        match published {
            Ok(()) => MetricsLogger::log_notification_published(
                ctx.wallet.as_str(),
                notification.transaction.hash.as_str(),
                subscriber_count,
            ),
            Err(e) => LogContext::new("listener", "publish_activity")
                .with_wallet(ctx.wallet.as_str())
                .with_transaction_hash(notification.transaction.hash.as_str())
                .with_metadata("transfer_count", json!(notification.transfers.len()))
                .with_error(&e)
                .error("Failed to publish notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hand_off_drops_newest_when_full() {
        let (queue, mut pending) = mpsc::channel(1);

        assert_eq!(hand_off(&queue, 1), HandOff::Queued);
        assert_eq!(hand_off(&queue, 2), HandOff::Dropped("notification buffer full"));

        assert_eq!(pending.recv().await, Some(1));
        assert_eq!(hand_off(&queue, 3), HandOff::Queued);
        assert_eq!(pending.recv().await, Some(3));
    }

    #[tokio::test]
    async fn test_hand_off_to_stopped_consumer() {
        let (queue, pending) = mpsc::channel::<u8>(1);
        drop(pending);

        assert_eq!(hand_off(&queue, 1), HandOff::Dropped("notification consumer stopped"));
    }
}

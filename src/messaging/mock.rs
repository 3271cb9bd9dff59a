use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{CommandHandler, NotificationPublisher};
use crate::error::TransportError;
use crate::models::{Command, WalletNotification};

/// Publisher that keeps every notification in memory
#[derive(Default)]
pub(crate) struct MockPublisher {
    published: Mutex<Vec<WalletNotification>>,
    fail: AtomicBool,
}

impl MockPublisher {
    pub(crate) fn failing() -> Self {
        let publisher = Self::default();
        publisher.fail.store(true, Ordering::SeqCst);
        publisher
    }

    pub(crate) fn published(&self) -> Vec<WalletNotification> {
        self.published.lock().unwrap().clone()
    }

    pub(crate) fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationPublisher for MockPublisher {
    async fn publish(&self, notification: &WalletNotification) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::MalformedPayload("publish refused".to_string()));
        }
        self.published.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Handler that records the commands it receives
#[derive(Default)]
pub(crate) struct RecordingHandler {
    commands: Mutex<Vec<Command>>,
}

impl RecordingHandler {
    pub(crate) fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn handle_command(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }
}

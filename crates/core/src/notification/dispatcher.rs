use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::{Notification, NotificationHandle};

/// Delivery failure reported by a sink.
#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// A notification delivery channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Sink that writes notifications to the log.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        tracing::info!(
            title = %notification.title,
            message = %notification.message,
            "Notification"
        );
        Ok(())
    }
}

/// Background task that receives notifications and hands them to the sink.
pub struct NotificationDispatcher {
    rx: mpsc::Receiver<Notification>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationDispatcher {
    pub fn new(rx: mpsc::Receiver<Notification>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { rx, sink }
    }

    /// Run until every handle is dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!("Notification dispatcher started");

        while let Some(notification) = self.rx.recv().await {
            if let Err(e) = self.sink.deliver(&notification).await {
                tracing::error!(title = %notification.title, error = %e, "Failed to deliver notification");
            }
        }

        tracing::info!("Notification dispatcher shutting down");
    }
}

/// Create a notification handle and its dispatcher.
///
/// Spawn the dispatcher with `tokio::spawn(dispatcher.run())`.
pub fn create_notification_system(
    sink: Arc<dyn NotificationSink>,
    buffer_size: usize,
) -> (NotificationHandle, NotificationDispatcher) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (NotificationHandle::new(tx), NotificationDispatcher::new(rx, sink))
}

use tokio::sync::mpsc;

use super::Notification;

/// Handle for sending notifications.
///
/// Cheaply cloneable. Sending never fails the caller: a closed or full
/// channel is logged and the notification dropped.
#[derive(Clone)]
pub struct NotificationHandle {
    tx: mpsc::Sender<Notification>,
}

impl NotificationHandle {
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self { tx }
    }

    /// A handle whose notifications are discarded (logged at debug level).
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    /// Queue a notification without blocking.
    pub fn notify(&self, title: impl Into<String>, message: impl Into<String>) {
        let notification = Notification::new(title, message);
        if let Err(e) = self.tx.try_send(notification) {
            match e {
                mpsc::error::TrySendError::Full(n) => {
                    tracing::error!(title = %n.title, "Notification channel full, dropping notification");
                }
                mpsc::error::TrySendError::Closed(n) => {
                    tracing::debug!(title = %n.title, message = %n.message, "Notifications disabled");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_sends() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = NotificationHandle::new(tx);

        handle.notify("Movie Downloaded", "Heat (1995)");

        let n = rx.try_recv().expect("Should receive notification");
        assert_eq!(n.title, "Movie Downloaded");
        assert_eq!(n.message, "Heat (1995)");
    }

    #[test]
    fn test_notify_full_channel_does_not_fail() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = NotificationHandle::new(tx);
        handle.notify("a", "1");
        handle.notify("b", "2");
    }

    #[test]
    fn test_disabled_handle_drops_silently() {
        let handle = NotificationHandle::disabled();
        handle.notify("title", "message");
    }

    #[test]
    fn test_clones_share_channel() {
        let (tx, mut rx) = mpsc::channel(10);
        let first = NotificationHandle::new(tx);
        let second = first.clone();

        first.notify("one", "");
        second.notify("two", "");

        assert_eq!(rx.try_recv().unwrap().title, "one");
        assert_eq!(rx.try_recv().unwrap().title, "two");
    }
}

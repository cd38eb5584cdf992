//! Fire-and-forget delivery of [`Notification`]s.
//!
//! Callers hand a notification over only after their change is committed
//! and their locks are released. A sink must never block, and a failed
//! delivery is not an error for the caller.

use educoin_types::Notification;
use tokio::sync::mpsc;
use tracing::debug;

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Pushes notifications into an unbounded tokio channel. The receiving end
/// is typically drained by the application's delivery task.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(err) = self.tx.send(notification) {
            debug!(notification = ?err.0, "Notification receiver closed, dropping");
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}

//! User-visible error notifications.
//!
//! The client reports every failed call through a `Notifier` before
//! returning the error. The notifier is injected at construction, so a UI
//! can route messages to a toast and tests can count them.

use tokio::sync::mpsc;

pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Emits each message as a `tracing` error event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, message: &str) {
        tracing::error!(target: "request_core::notify", "{message}");
    }
}

/// Forwards messages into an unbounded channel drained by the UI layer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify_error(&self, message: &str) {
        // A dropped receiver means nobody is displaying errors any more.
        if self.tx.send(message.to_string()).is_err() {
            tracing::debug!("notification receiver dropped: {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_forwards_messages_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify_error("first");
        notifier.notify_error("second");
        assert_eq!(rx.try_recv().unwrap(), "first");
        assert_eq!(rx.try_recv().unwrap(), "second");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify_error("nobody listening");
    }
}

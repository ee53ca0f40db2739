//! Process-wide change broadcast for queue observers

use tokio::sync::broadcast;

/// Capacity is generous; observers only care that "something changed",
/// so lagged receivers can safely treat the lag as a single change.
const CHANNEL_CAPACITY: usize = 64;

/// Broadcast fired whenever any pending queue changes size.
///
/// There is no payload: observers re-read the counts they care about.
/// Firing is synchronous and never fails the mutator; dropping the
/// receiver revokes the subscription.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<()>,
}

impl ChangeNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to change events; drop the receiver to unsubscribe
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire a change event; a send with no observers is not an error
    pub fn notify(&self) {
        let _ = self.tx.send(());
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn observers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_observers_is_fine() {
        let notifier = ChangeNotifier::new();
        notifier.notify();
    }

    #[test]
    fn test_observers_receive_events() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe();

        notifier.notify();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_revokes_subscription() {
        let notifier = ChangeNotifier::new();
        let rx = notifier.subscribe();
        assert_eq!(notifier.observers(), 1);

        drop(rx);
        assert_eq!(notifier.observers(), 0);
    }
}

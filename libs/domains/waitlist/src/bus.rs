//! In-process publish/subscribe channel for [`WaitlistEvent`]s
//!
//! Delivery is synchronous: `publish` invokes every subscriber, in
//! subscription order, before returning. A panicking subscriber is caught and
//! logged; the remaining subscribers still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::events::WaitlistEvent;

type Subscriber = Arc<dyn Fn(&WaitlistEvent) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct NotificationBus {
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every event
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&WaitlistEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write_subscribers().push((id, Arc::new(callback)));
        id
    }

    /// Receive a clone of every event on an unbounded channel
    ///
    /// The subscription is dropped automatically the first time an event is
    /// published after the receiver has gone away.
    pub fn subscribe_channel(self: &Arc<Self>) -> mpsc::UnboundedReceiver<WaitlistEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Arc::downgrade(self);
        let id_cell: Arc<std::sync::OnceLock<SubscriptionId>> = Arc::default();
        let id_for_callback = id_cell.clone();

        let id = self.subscribe(move |event| {
            if tx.send(event.clone()).is_err() {
                if let (Some(bus), Some(id)) = (bus.upgrade(), id_for_callback.get()) {
                    bus.unsubscribe(*id);
                }
            }
        });
        let _ = id_cell.set(id);

        rx
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.write_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.read_subscribers().len()
    }

    /// Deliver `event` to every subscriber
    pub fn publish(&self, event: WaitlistEvent) {
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking
        let snapshot: Vec<(SubscriptionId, Subscriber)> = self.read_subscribers().clone();

        tracing::trace!(event = event.name(), subscribers = snapshot.len(), "Publishing event");

        for (id, subscriber) in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| subscriber(&event))) {
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic payload".to_string()
                };
                tracing::error!(
                    subscription = id.0,
                    event = event.name(),
                    panic = %message,
                    "Event subscriber panicked"
                );
            }
        }
    }

    fn read_subscribers(&self) -> std::sync::RwLockReadGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_subscribers(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_delivers_in_subscription_order() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.subscribe(move |event| seen.lock().unwrap().push((tag, event.name())));
        }

        bus.publish(WaitlistEvent::ListCleared);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("first", "listCleared"),
                ("second", "listCleared"),
                ("third", "listCleared")
            ]
        );
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let bus = NotificationBus::new();
        let delivered = Arc::new(Mutex::new(0));

        bus.subscribe(|_| panic!("observer bug"));
        let counter = delivered.clone();
        bus.subscribe(move |_| *counter.lock().unwrap() += 1);

        bus.publish(WaitlistEvent::Initialized);
        bus.publish(WaitlistEvent::TransportReady);

        assert_eq!(*delivered.lock().unwrap(), 2);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = NotificationBus::new();
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let id = bus.subscribe(move |_| *counter.lock().unwrap() += 1);

        bus.publish(WaitlistEvent::ListCleared);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(WaitlistEvent::ListCleared);

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_subscribe_channel_receives_clones() {
        let bus = Arc::new(NotificationBus::new());
        let mut rx = bus.subscribe_channel();

        bus.publish(WaitlistEvent::EntryAdded("a@x.com".into()));

        assert_eq!(
            rx.try_recv().unwrap(),
            WaitlistEvent::EntryAdded("a@x.com".into())
        );
    }

    #[test]
    fn test_dropped_channel_unsubscribes() {
        let bus = Arc::new(NotificationBus::new());
        let rx = bus.subscribe_channel();
        drop(rx);

        bus.publish(WaitlistEvent::ListCleared);
        assert_eq!(bus.subscriber_count(), 0);
    }
}

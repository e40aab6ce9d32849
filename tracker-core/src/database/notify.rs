//! Change notification
//!
//! Subscribers register a callback and are told about every committed
//! mutation. Notifications are sent after the write is durable and never
//! for reads.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// A committed change to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreChange {
    CategoryCreated { title: String },
    TrackerCreated { tracker_id: Uuid, category_title: String },
    CompletionAdded { tracker_id: Uuid, date: NaiveDate },
    CompletionRemoved { tracker_id: Uuid, date: NaiveDate },
}

pub type ChangeCallback = Arc<dyn Fn(&StoreChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, ChangeCallback)>,
}

/// Registration list of change callbacks. Cloning shares the list.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        // A panicking callback cannot leave the list half-updated
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        let mut subscribers = self.lock();
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.callbacks.push((id, callback));

        tracing::debug!("Registered change subscriber {:?}", id);
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.callbacks.len();
        subscribers.callbacks.retain(|(existing, _)| *existing != id);
        before != subscribers.callbacks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().callbacks.len()
    }

    pub fn notify(&self, change: &StoreChange) {
        // Callbacks run outside the lock so they may (un)subscribe
        let callbacks: Vec<ChangeCallback> = self
            .lock()
            .callbacks
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        tracing::debug!("Notifying {} subscribers of {:?}", callbacks.len(), change);

        for callback in callbacks {
            callback(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribers_receive_changes() {
        let notifier = ChangeNotifier::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&received);
        notifier.subscribe(Arc::new(move |change: &StoreChange| {
            sink.lock().unwrap().push(change.clone());
        }));

        let change = StoreChange::CategoryCreated {
            title: "Work".to_string(),
        };
        notifier.notify(&change);

        assert_eq!(*received.lock().unwrap(), vec![change]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let notifier = ChangeNotifier::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = notifier.subscribe(Arc::new(move |_: &StoreChange| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        assert_eq!(notifier.subscriber_count(), 0);

        notifier.notify(&StoreChange::CategoryCreated {
            title: "Home".to_string(),
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let notifier = ChangeNotifier::new();
        let own_id = Arc::new(Mutex::new(None));

        let handle = notifier.clone();
        let slot = Arc::clone(&own_id);
        let id = notifier.subscribe(Arc::new(move |_: &StoreChange| {
            if let Some(id) = *slot.lock().unwrap() {
                handle.unsubscribe(id);
            }
        }));
        *own_id.lock().unwrap() = Some(id);

        notifier.notify(&StoreChange::CategoryCreated {
            title: "Sport".to_string(),
        });
        assert_eq!(notifier.subscriber_count(), 0);
    }
}

//! Single-slot broadcast.
//!
//! `Latest` keeps the most recent published value and a list of observers.
//! Publishing overwrites the value and notifies every observer; subscribing
//! notifies the new observer straight away when a value is already held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Latest::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription(Uuid);

struct Slot<T> {
    value: Option<T>,
    observers: Vec<(Subscription, Callback<T>)>,
}

pub struct Latest<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                observers: Vec::new(),
            }),
        }
    }
}

impl<T: Clone> Latest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the held value and notify every registered observer.
    pub fn publish(&self, value: T) {
        let observers: Vec<Callback<T>> = {
            let mut slot = self.lock();
            slot.value = Some(value.clone());
            slot.observers.iter().map(|(_, cb)| cb.clone()).collect()
        };
        // Observers run outside the lock so they may subscribe or publish.
        for cb in observers {
            cb(&value);
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = Subscription(Uuid::new_v4());
        let callback: Callback<T> = Arc::new(callback);
        let current = {
            let mut slot = self.lock();
            slot.observers.push((id.clone(), callback.clone()));
            slot.value.clone()
        };
        if let Some(value) = current {
            callback(&value);
        }
        id
    }

    /// Returns false when the subscription was not registered.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut slot = self.lock();
        let before = slot.observers.len();
        slot.observers.retain(|(id, _)| id != subscription);
        slot.observers.len() != before
    }

    pub fn value(&self) -> Option<T> {
        self.lock().value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<i32>>>, impl Fn(&i32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |v: &i32| sink.lock().unwrap().push(*v))
    }

    #[test]
    fn subscriber_waits_when_nothing_published() {
        let latest: Latest<i32> = Latest::new();
        let (seen, cb) = recorder();
        latest.subscribe(cb);
        assert!(seen.lock().unwrap().is_empty());

        latest.publish(1);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn late_subscriber_receives_last_value() {
        let latest: Latest<i32> = Latest::new();
        latest.publish(1);
        latest.publish(2);

        let (seen, cb) = recorder();
        latest.subscribe(cb);
        assert_eq!(*seen.lock().unwrap(), vec![2]);
        assert_eq!(latest.value(), Some(2));
    }

    #[test]
    fn publish_reaches_every_observer() {
        let latest: Latest<i32> = Latest::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            latest.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        latest.publish(7);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let latest: Latest<i32> = Latest::new();
        let (seen, cb) = recorder();
        let sub = latest.subscribe(cb);
        latest.publish(1);
        assert!(latest.unsubscribe(&sub));
        assert!(!latest.unsubscribe(&sub));
        latest.publish(2);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn observer_may_publish_reentrantly() {
        let latest: Arc<Latest<i32>> = Arc::new(Latest::new());
        let inner = latest.clone();
        latest.subscribe(move |v| {
            if *v == 1 {
                inner.publish(2);
            }
        });
        latest.publish(1);
        assert_eq!(latest.value(), Some(2));
    }
}

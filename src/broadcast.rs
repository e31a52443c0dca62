// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! Replay-latest broadcast channels.
//!
//! A [`ReplaySubject`] fans published values out to every registered
//! subscriber in registration order and hands the most recently published
//! value to late subscribers at registration time, so a component created
//! after login still observes the current user immediately.
//!
//! Subscriber callbacks run after the subject's internal lock has been
//! released; a callback may publish to or subscribe on the same subject
//! without deadlocking, and no subscriber can block another through the
//! subject itself.
//!
//! Delivery order is only guaranteed for a single publishing thread.
//! Concurrent publishers race past the lock release, so two values
//! published from different threads may reach a subscriber in either
//! order, and the later delivery may disagree with [`ReplaySubject::last_value`].
//! The session coordinator publishes from one logical writer at a time,
//! which keeps it within the guaranteed case.

use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct SubjectInner<T> {
    /// Most recently published value, replayed to new subscribers.
    last: Option<T>,
    /// Subscribers in registration order.
    subscribers: Vec<(u64, Callback<T>)>,
    next_id: u64,
}

/// Multi-subscriber broadcast channel with replay-of-latest semantics.
pub struct ReplaySubject<T> {
    inner: Arc<Mutex<SubjectInner<T>>>,
}

impl<T: Clone + Send + 'static> ReplaySubject<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SubjectInner {
                last: None,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a subscriber callback.
    ///
    /// If a value has already been published, the callback is invoked with
    /// it immediately, before this call returns. The returned handle keeps
    /// the registration alive; dropping it unsubscribes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);

        let (id, replay) = {
            let mut inner = self.inner.lock().expect("subject lock poisoned");
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Arc::clone(&callback)));
            (id, inner.last.clone())
        };

        // Replay outside the lock so the callback may re-enter the subject.
        if let Some(value) = replay {
            callback(&value);
        }

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Publish a value to all current subscribers, in registration order.
    pub fn publish(&self, value: T) {
        let callbacks: Vec<Callback<T>> = {
            let mut inner = self.inner.lock().expect("subject lock poisoned");
            inner.last = Some(value.clone());
            inner.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        for callback in callbacks {
            callback(&value);
        }
    }

    /// The most recently published value, if any.
    pub fn last_value(&self) -> Option<T> {
        self.inner.lock().expect("subject lock poisoned").last.clone()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("subject lock poisoned").subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Default for ReplaySubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a single subscription. Unsubscribes on drop.
pub struct Subscription<T> {
    id: u64,
    inner: Weak<Mutex<SubjectInner<T>>>,
}

impl<T> Subscription<T> {
    /// Remove the subscriber from the subject. Equivalent to dropping the
    /// handle; provided for explicit teardown in `stop()`-style lifecycles.
    pub fn unsubscribe(self) {
        // Drop impl does the work.
    }

    fn remove(&self) {
        if let Some(inner) = self.inner.upgrade() {
            if let Ok(mut inner) = inner.lock() {
                inner.subscribers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let subject: ReplaySubject<i32> = ReplaySubject::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let first_clone = Arc::clone(&first);
        let _sub1 = subject.subscribe(move |v| {
            first_clone.store(*v as usize, Ordering::SeqCst);
        });
        let second_clone = Arc::clone(&second);
        let _sub2 = subject.subscribe(move |v| {
            second_clone.store(*v as usize, Ordering::SeqCst);
        });

        subject.publish(42);

        assert_eq!(first.load(Ordering::SeqCst), 42);
        assert_eq!(second.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_late_subscriber_receives_last_value() {
        let subject: ReplaySubject<String> = ReplaySubject::new();
        subject.publish("first".to_string());
        subject.publish("second".to_string());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = subject.subscribe(move |v: &String| {
            seen_clone.lock().unwrap().push(v.clone());
        });

        // Only the latest value is replayed, not the whole history.
        assert_eq!(*seen.lock().unwrap(), vec!["second".to_string()]);
    }

    #[test]
    fn test_subscriber_before_first_publish_gets_nothing() {
        let subject: ReplaySubject<i32> = ReplaySubject::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        let _sub = subject.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_values_delivered_in_publish_order() {
        let subject: ReplaySubject<i32> = ReplaySubject::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        let _sub = subject.subscribe(move |v| {
            seen_clone.lock().unwrap().push(*v);
        });

        subject.publish(1);
        subject.publish(2);
        subject.publish(3);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let subject: ReplaySubject<i32> = ReplaySubject::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        let sub = subject.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        subject.publish(1);
        sub.unsubscribe();
        subject.publish(2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let subject: ReplaySubject<i32> = ReplaySubject::new();
        {
            let _sub = subject.subscribe(|_| {});
            assert_eq!(subject.subscriber_count(), 1);
        }
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_from_callback_does_not_deadlock() {
        let subject: Arc<ReplaySubject<i32>> = Arc::new(ReplaySubject::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let subject_clone = Arc::clone(&subject);
        let seen_clone = Arc::clone(&seen);
        let _sub = subject.subscribe(move |v| {
            seen_clone.lock().unwrap().push(*v);
            if *v == 1 {
                subject_clone.publish(2);
            }
        });

        subject.publish(1);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(subject.last_value(), Some(2));
    }
}

//! Observable value cell
//!
//! Values live in a `tokio::sync::watch` channel so async consumers can
//! await changes; synchronous callbacks are kept alongside it.
//!
//! Deliveries are serialized per cell, so every subscriber's last delivery
//! is the cell's current value. Callbacks therefore must not write to, or
//! subscribe to, the cell that is calling them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

/// A single observable mutable value
pub struct Cell<T> {
    sender: watch::Sender<T>,
    subscribers: Arc<Mutex<Subscribers<T>>>,
    /// Held across read-then-deliver
    delivery: Mutex<()>,
}

impl<T> Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender,
            subscribers: Arc::new(Mutex::new(Subscribers {
                next_id: 0,
                callbacks: Vec::new(),
            })),
            delivery: Mutex::new(()),
        }
    }

    /// Clone of the current value
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Read the current value without cloning it. `f` must not write to
    /// the cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.sender.borrow())
    }

    /// Register a callback. It is invoked with the current value right away
    /// and again after every change, until the returned handle is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        let _delivery = lock(&self.delivery);

        let id = {
            let mut subscribers = lock(&self.subscribers);
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.callbacks.push((id, Arc::clone(&callback)));
            id
        };

        let current = self.get();
        callback(&current);

        let registry: Weak<Mutex<Subscribers<T>>> = Arc::downgrade(&self.subscribers);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    lock(&registry).callbacks.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Receiver for async consumers; it observes every value set after this call
    pub fn watch(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).callbacks.len()
    }

    /// Replace the value and notify subscribers
    pub(crate) fn set(&self, value: T) {
        let _delivery = lock(&self.delivery);
        self.replace(value);
        self.deliver();
    }

    /// Replace the value without running callbacks. Watch receivers are
    /// still marked as changed.
    pub(crate) fn replace(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Run every callback with the current value
    pub(crate) fn notify(&self) {
        let _delivery = lock(&self.delivery);
        self.deliver();
    }

    fn deliver(&self) {
        let value = self.get();

        // Snapshot so callbacks may unsubscribe while running.
        let callbacks: Vec<Callback<T>> = lock(&self.subscribers)
            .callbacks
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(&value);
        }
    }
}

impl<T> Default for Cell<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by [`Cell::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn recorder<T>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync + 'static)
    where
        T: Clone + Send + Sync + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &T| sink.lock().unwrap().push(value.clone()))
    }

    #[test]
    fn test_subscribe_delivers_current_then_changes() {
        let cell = Cell::new(1);
        let (seen, callback) = recorder::<i32>();

        let _subscription = cell.subscribe(callback);
        cell.set(2);
        cell.set(3);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(cell.get(), 3);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let cell = Cell::new("a".to_string());
        let (seen, callback) = recorder::<String>();

        let subscription = cell.subscribe(callback);
        assert_eq!(cell.subscriber_count(), 1);

        subscription.unsubscribe();
        cell.set("b".to_string());

        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string()]);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_dropping_handle_unsubscribes() {
        let cell = Cell::new(false);
        let (seen, callback) = recorder::<bool>();

        {
            let _subscription = cell.subscribe(callback);
            cell.set(true);
        }
        cell.set(false);

        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_replace_defers_callbacks_until_notify() {
        let cell = Cell::new(0);
        let (seen, callback) = recorder::<i32>();
        let _subscription = cell.subscribe(callback);

        cell.replace(5);
        assert_eq!(*seen.lock().unwrap(), vec![0]);

        cell.notify();
        assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
    }

    #[test]
    fn test_with_reads_without_cloning() {
        let cell = Cell::new(vec![1, 2, 3]);
        assert_eq!(cell.with(|items: &Vec<i32>| items.len()), 3);

        cell.set(vec![4]);
        assert_eq!(cell.with(|items: &Vec<i32>| items.first().copied()), Some(4));
    }

    #[test]
    fn test_handle_outliving_cell_is_harmless() {
        let cell = Cell::new(0u8);
        let subscription = cell.subscribe(|_| {});
        drop(cell);
        subscription.unsubscribe();
    }

    #[test]
    fn test_concurrent_writers_deliver_in_write_order() {
        let cell = Arc::new(Cell::new(0));
        let (seen, record) = recorder::<i32>();

        let _subscription = cell.subscribe(move |value: &i32| {
            if *value == 1 {
                std::thread::sleep(Duration::from_millis(200));
            }
            record(value);
        });

        let first = {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || cell.set(1))
        };
        std::thread::sleep(Duration::from_millis(50));
        let second = {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || cell.set(2))
        };
        first.join().unwrap();
        second.join().unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.last(), Some(&cell.get()));
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_subscribe_during_write_ends_on_current_value() {
        let cell = Arc::new(Cell::new(0));
        let _slow = cell.subscribe(|value: &i32| {
            if *value == 1 {
                std::thread::sleep(Duration::from_millis(200));
            }
        });

        let writer = {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || cell.set(1))
        };
        std::thread::sleep(Duration::from_millis(50));

        let (seen, record) = recorder::<i32>();
        let _late = cell.subscribe(record);
        writer.join().unwrap();

        assert_eq!(seen.lock().unwrap().last(), Some(&cell.get()));
    }

    #[tokio::test]
    async fn test_watch_receiver_sees_changes() {
        let cell = Cell::new(0u32);
        let mut receiver = cell.watch();

        cell.set(7);
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow(), 7);
    }
}

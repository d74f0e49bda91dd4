//! Observer broadcast of connection snapshots

use crate::sync::lock;
use bit_link_shared::ConnectionSnapshot;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::error;

/// Callback invoked with `(label, snapshot)` on every change
pub type Listener = Arc<dyn Fn(&str, &ConnectionSnapshot) + Send + Sync>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&str, &ConnectionSnapshot) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Ordered list of subscribers
#[derive(Default)]
pub struct Broadcaster {
    listeners: Mutex<Vec<Listener>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener; the same listener may be added more than once
    pub fn subscribe(&self, listener: Listener) {
        lock(&self.listeners).push(listener);
    }

    /// Remove the first instance of `listener`, returning whether one was found
    pub fn unsubscribe(&self, listener: &Listener) -> bool {
        let mut listeners = lock(&self.listeners);
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener in subscription order
    ///
    /// The list is copied first so listeners may subscribe, unsubscribe or
    /// read state re-entrantly. A panicking listener is logged and skipped.
    pub fn emit(&self, label: &str, snapshot: &ConnectionSnapshot) {
        let listeners = lock(&self.listeners).clone();

        for (index, listener) in listeners.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(label, snapshot)));
            if outcome.is_err() {
                error!("[LINK] Listener #{} panicked while handling {}", index, label);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = counter.clone();
        listener(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_in_subscription_order() {
        let broadcaster = Broadcaster::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = order.clone();
            broadcaster.subscribe(listener(move |label, _| {
                order.lock().unwrap().push(format!("{}:{}", tag, label));
            }));
        }

        broadcaster.emit("led", &ConnectionSnapshot::default());
        assert_eq!(*order.lock().unwrap(), vec!["first:led", "second:led"]);
    }

    #[test]
    fn test_duplicates_and_first_match_removal() {
        let broadcaster = Broadcaster::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let l = counting(&hits);

        broadcaster.subscribe(l.clone());
        broadcaster.subscribe(l.clone());
        broadcaster.emit("led", &ConnectionSnapshot::default());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(broadcaster.unsubscribe(&l));
        assert_eq!(broadcaster.len(), 1);
        broadcaster.emit("led", &ConnectionSnapshot::default());
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        assert!(broadcaster.unsubscribe(&l));
        assert!(!broadcaster.unsubscribe(&l));
        assert!(broadcaster.is_empty());
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let broadcaster = Broadcaster::new();
        let hits = Arc::new(AtomicUsize::new(0));

        broadcaster.subscribe(listener(|_, _| panic!("bad subscriber")));
        broadcaster.subscribe(counting(&hits));

        broadcaster.emit("led", &ConnectionSnapshot::default());
        broadcaster.emit("led", &ConnectionSnapshot::default());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_can_unsubscribe_during_emit() {
        let broadcaster = Arc::new(Broadcaster::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));

        let b = broadcaster.clone();
        let s = slot.clone();
        let h = hits.clone();
        let once = listener(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = s.lock().unwrap().take() {
                b.unsubscribe(&me);
            }
        });
        *slot.lock().unwrap() = Some(once.clone());
        broadcaster.subscribe(once);

        broadcaster.emit("led", &ConnectionSnapshot::default());
        broadcaster.emit("led", &ConnectionSnapshot::default());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

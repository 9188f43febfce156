//! Synchronous observer primitives.
//!
//! A [`Signal`] broadcasts a value to every registered listener on the
//! caller's thread. A [`Watch`] pairs a current value with a signal that
//! fires on edges. Listeners are deregistered by dropping their
//! [`Subscription`].
//!
//! Emission works on a snapshot of the listener list, so a listener may
//! unsubscribe itself (or tear down whatever owns other subscriptions)
//! while an emission is still in flight. Listeners removed mid-emission
//! can still be invoked once from that snapshot and must check their own
//! liveness.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

/// Shared listener callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

struct SignalInner<T> {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener<T>)>,
}

/// Synchronous broadcast signal.
pub struct Signal<T> {
    inner: Arc<Mutex<SignalInner<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<T: 'static> Signal<T> {
    /// Creates a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. It stays registered until the returned
    /// subscription is dropped or unsubscribed.
    #[must_use = "dropping the subscription detaches the listener immediately"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.inner.lock();
            let id = ListenerId(inner.next_id);
            inner.next_id += 1;
            inner.listeners.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<SignalInner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            detach: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Delivers `value` to every listener registered at the time of the
    /// call. Returns the number of listeners invoked.
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &snapshot {
            listener(value);
        }
        snapshot.len()
    }

    /// Number of currently registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.inner.lock().listeners.len())
            .finish()
    }
}

/// Registration handle returned by [`Signal::subscribe`].
pub struct Subscription {
    id: ListenerId,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// ID of the listener this subscription owns.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether the listener is still attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }

    /// Detaches the listener. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A current value plus a change signal.
pub struct Watch<T> {
    value: Arc<RwLock<T>>,
    changed: Signal<T>,
}

impl<T> Clone for Watch<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            changed: self.changed.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Watch<T> {
    /// Creates a watch holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial)),
            changed: Signal::new(),
        }
    }

    /// Reads the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Stores `value` and notifies listeners if it differs from the
    /// current one. Returns whether an edge occurred.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.value.write();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.changed.emit(&value);
        true
    }

    /// Notifies listeners with the current value even if nothing changed.
    pub fn notify(&self) -> usize {
        let value = self.get();
        self.changed.emit(&value)
    }

    /// Registers a change listener.
    #[must_use = "dropping the subscription detaches the listener immediately"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.changed.subscribe(listener)
    }

    /// Number of registered change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.changed.listener_count()
    }
}

impl<T: fmt::Debug> fmt::Debug for Watch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("value", &*self.value.read())
            .field("changed", &self.changed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_all_listeners() {
        let signal = Signal::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = Arc::clone(&hits);
        let _a = signal.subscribe(move |v| {
            h1.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let h2 = Arc::clone(&hits);
        let _b = signal.subscribe(move |v| {
            h2.fetch_add(*v as usize, Ordering::SeqCst);
        });

        assert_eq!(signal.emit(&5), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_drop_detaches() {
        let signal = Signal::<()>::new();
        let sub = signal.subscribe(|()| {});
        assert_eq!(signal.listener_count(), 1);
        drop(sub);
        assert_eq!(signal.listener_count(), 0);
        assert_eq!(signal.emit(&()), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let signal = Signal::<()>::new();
        let mut sub = signal.subscribe(|()| {});
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_during_emit() {
        let signal = Signal::<()>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_in = Arc::clone(&slot);
        let sub = signal.subscribe(move |()| {
            if let Some(mut sub) = slot_in.lock().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);

        assert_eq!(signal.emit(&()), 1);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_signal() {
        let signal = Signal::<()>::new();
        let sub = signal.subscribe(|()| {});
        drop(signal);
        drop(sub);
    }

    #[test]
    fn test_watch_edges_only() {
        let watch = Watch::new(1u32);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = watch.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!watch.set(1));
        assert!(watch.set(2));
        assert!(!watch.set(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(watch.get(), 2);
    }

    #[test]
    fn test_watch_notify_forces() {
        let watch = Watch::new(7u32);
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let _sub = watch.subscribe(move |v| {
            s.store(*v as usize, Ordering::SeqCst);
        });

        assert_eq!(watch.notify(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_watch_listener_reads_new_value() {
        let watch = Watch::new(0u32);
        let reader = watch.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let _sub = watch.subscribe(move |_| {
            s.store(reader.get() as usize, Ordering::SeqCst);
        });

        watch.set(9);
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }
}

//! Typed signals with explicit subscription handles.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(u64, Handler<T>)>>,
}

/// A broadcast point that handlers subscribe to.
///
/// Emission snapshots the current handlers and calls them without holding
/// any lock, so a handler may subscribe or unsubscribe (itself included)
/// while the signal is being emitted.
pub struct Signal<T> {
    name: &'static str,
    slots: Arc<Slots<T>>,
}

impl<T: 'static> Signal<T> {
    /// Creates a signal with a name used in diagnostics.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Arc::new(Slots {
                next_id: AtomicU64::new(0),
                handlers: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Returns the signal's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Subscribes a handler.
    ///
    /// The handler stays attached until the returned subscription is
    /// unsubscribed or dropped.
    #[must_use = "dropping the subscription detaches the handler"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.slots.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots.handlers.write().push((id, Arc::new(handler)));

        let slots: Weak<Slots<T>> = Arc::downgrade(&self.slots);
        Subscription {
            signal: self.name,
            detach: Some(Box::new(move || {
                if let Some(slots) = slots.upgrade() {
                    slots.handlers.write().retain(|(slot_id, _)| *slot_id != id);
                }
            })),
        }
    }

    /// Delivers `value` to every subscribed handler.
    ///
    /// A panicking handler is logged and does not stop delivery.
    pub fn emit(&self, value: &T) {
        let handlers: Vec<Handler<T>> = self
            .slots
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in handlers {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(value);
            })) {
                warn!(signal = self.name, "Signal handler panicked: {:?}", e);
            }
        }
    }

    /// Returns the number of attached handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.slots.handlers.read().len()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            slots: self.slots.clone(),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("subscribers", &self.slots.handlers.read().len())
            .finish()
    }
}

/// Handle to an attached signal handler.
///
/// Unsubscribing is idempotent, and dropping the handle unsubscribes.
pub struct Subscription {
    signal: &'static str,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Detaches the handler. Further calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    /// Returns true while the handler is attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }

    /// Returns the name of the signal this handle belongs to.
    #[must_use]
    pub fn signal(&self) -> &'static str {
        self.signal
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
            .field("signal", &self.signal)
            .field("active", &self.is_active())
            .finish()
    }
}

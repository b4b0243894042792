//! Subscriber-based notifications for configuration changes.

use crate::runtime::Fault;
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// When the handle is dropped, the subscription is removed immediately.
/// Call [`detach`](SubscriptionHandle::detach) to keep the subscription for the
/// lifetime of the registry instead.
#[must_use = "dropping the handle unsubscribes the callback"]
pub struct SubscriptionHandle {
    id: usize,
    unsubscribe: Option<Box<dyn FnOnce(usize) + Send + Sync>>,
}

impl SubscriptionHandle {
    /// Keep the subscription alive without holding the handle.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe(self.id);
        }
    }
}

/// Internal subscriber registry state.
struct SubscriberRegistryInner<A: ?Sized> {
    subscribers: Vec<(usize, Callback<A>)>,
    next_id: usize,
}

/// Ordered registry of callbacks receiving a `&A` on every notification.
///
/// Callbacks run synchronously on the notifying thread, in the order they were
/// subscribed. The list is copied out before any callback runs, so callbacks may
/// subscribe or unsubscribe without deadlocking. A panicking callback is logged
/// and the remaining callbacks still run.
///
/// # Examples
///
/// ```rust
/// use bootkit::notify::SubscriberRegistry;
///
/// let registry: SubscriberRegistry<u32> = SubscriberRegistry::new();
///
/// let handle = registry.subscribe(|value: &u32| {
///     println!("Config changed: {value}");
/// });
///
/// registry.notify_all(&7);
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// ```
pub struct SubscriberRegistry<A: ?Sized> {
    inner: Arc<Mutex<SubscriberRegistryInner<A>>>,
}

impl<A: ?Sized + 'static> SubscriberRegistry<A> {
    /// Create a new subscriber registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SubscriberRegistryInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a callback. Returns a handle that unsubscribes when dropped.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let callback: Callback<A> = Arc::new(callback);
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, callback));
            id
        };

        let registry: Weak<Mutex<SubscriberRegistryInner<A>>> = Arc::downgrade(&self.inner);
        SubscriptionHandle {
            id,
            unsubscribe: Some(Box::new(move |id| {
                if let Some(registry) = registry.upgrade() {
                    registry.lock().subscribers.retain(|(sub_id, _)| *sub_id != id);
                }
            })),
        }
    }

    /// Call every subscriber with `value`, in subscription order.
    ///
    /// Returns the number of callbacks that panicked.
    pub fn notify_all(&self, value: &A) -> usize {
        let callbacks: Vec<Callback<A>> = self
            .inner
            .lock()
            .subscribers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        let mut panicked = 0;
        for callback in callbacks {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(value))) {
                panicked += 1;
                tracing::error!(error = %Fault::from_panic(payload), "change callback panicked");
            }
        }
        panicked
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl<A: ?Sized + 'static> Default for SubscriberRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> Clone for SubscriberRegistry<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

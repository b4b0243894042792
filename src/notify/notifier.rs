//! Fan-out of "configuration changed" events.

use crate::core::Tree;
use crate::notify::{SubscriberRegistry, SubscriptionHandle};

/// Delivers every successfully reloaded tree to registered callbacks.
///
/// This is the single notification list of a [`ConfigStore`](crate::core::ConfigStore):
/// bindings register one entry each when they are created and fire their own
/// subscribers from inside it, so the relative order of all reload reactions is
/// the order in which they were registered.
///
/// Callbacks run on the reload path while the store's reload lock is held.
/// They are synchronous and cannot await another reload.
#[derive(Clone, Default)]
pub struct ReloadNotifier {
    registry: SubscriberRegistry<Tree>,
}

impl ReloadNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked with the new tree after each successful reload.
    pub fn on_reload<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Tree) + Send + Sync + 'static,
    {
        self.registry.subscribe(callback)
    }

    /// Deliver `tree` to every callback in registration order.
    pub fn notify(&self, tree: &Tree) {
        self.registry.notify_all(tree);
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.registry.subscriber_count()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

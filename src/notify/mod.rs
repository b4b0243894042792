//! Configuration change notification system.
//!
//! Provides the reload notifier, subscriber registries and, with the
//! `file-watch` feature, debounced file watching.

pub mod notifier;
pub mod subscriber;

#[cfg(feature = "file-watch")]
pub mod debounce;
#[cfg(feature = "file-watch")]
pub mod watcher;

pub use notifier::ReloadNotifier;
pub use subscriber::{SubscriberRegistry, SubscriptionHandle};

#[cfg(feature = "file-watch")]
pub use watcher::{ConfigWatcher, DEFAULT_DEBOUNCE};

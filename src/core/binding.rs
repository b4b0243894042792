//! Typed, live views of a configuration sub-tree.

use crate::core::{ConfigStore, Tree, Validate};
use crate::error::{ConfigError, Result};
use crate::notify::{SubscriberRegistry, SubscriptionHandle};
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// A typed value decoded from one path of the configuration tree.
///
/// The value follows successful reloads of the store it was bound to. A reload
/// whose content fails to decode or validate is rejected for this binding: the
/// previous value stays, no callback runs and a warning is logged.
///
/// Clones share the value and the callbacks. The binding stops following
/// reloads once every clone is dropped.
///
/// # Examples
///
/// ```rust
/// use bootkit::core::{Binding, Validate};
///
/// #[derive(Debug, serde::Deserialize)]
/// struct Limits {
///     max: u32,
/// }
///
/// impl Validate for Limits {}
///
/// let limits = Binding::new(Limits { max: 10 });
/// assert_eq!(limits.get().max, 10);
/// ```
pub struct Binding<T> {
    current: Arc<ArcSwap<T>>,
    path: Arc<str>,
    subscribers: SubscriberRegistry<Arc<T>>,
    registration: Option<Arc<SubscriptionHandle>>,
}

impl<T> Binding<T>
where
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    /// Decode and validate `path` from the store's current tree and follow
    /// every later reload.
    ///
    /// # Errors
    ///
    /// Returns a decode error or [`ConfigError::ValidationError`] if the current
    /// content at `path` is not acceptable.
    pub fn bind(store: &ConfigStore, path: &str) -> Result<Self> {
        let initial = decode_validated::<T>(&store.tree(), path)?;

        let current = Arc::new(ArcSwap::from_pointee(initial));
        let path: Arc<str> = Arc::from(path);
        let subscribers = SubscriberRegistry::new();

        let on_reload = Self::reload_handler(
            store,
            Arc::clone(&current),
            Arc::clone(&path),
            subscribers.clone(),
        );
        let registration = store.notifier().on_reload(on_reload);

        tracing::debug!(path = %path, "configuration bound");
        Ok(Self {
            current,
            path,
            subscribers,
            registration: Some(Arc::new(registration)),
        })
    }

    fn reload_handler(
        _store: &ConfigStore,
        current: Arc<ArcSwap<T>>,
        path: Arc<str>,
        subscribers: SubscriberRegistry<Arc<T>>,
    ) -> impl Fn(&Tree) + Send + Sync + 'static {
        #[cfg(feature = "metrics")]
        let metrics: Option<ReloadMetrics> = _store.metrics().cloned();

        move |tree: &Tree| match decode_validated::<T>(tree, &path) {
            Ok(value) => {
                let value = Arc::new(value);
                current.store(Arc::clone(&value));
                subscribers.notify_all(&value);
            }
            Err(err) => {
                tracing::warn!(
                    path = %path,
                    error = %err,
                    "rejected reloaded configuration, keeping previous value"
                );
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &metrics {
                    metrics.record_binding_rejection(&path);
                }
            }
        }
    }
}

impl<T: Send + Sync + 'static> Binding<T> {
    /// A binding holding `value`, not attached to any store.
    pub fn new(value: T) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(value)),
            path: Arc::from(""),
            subscribers: SubscriberRegistry::new(),
            registration: None,
        }
    }

    /// The current value.
    ///
    /// Lock-free; readers never block a reload or each other.
    pub fn get(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// The path this binding decodes. Empty for a standalone binding.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Register a callback run with the new value after every accepted reload,
    /// for as long as the binding lives.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(callback).detach();
    }

    /// Like [`on_change`](Self::on_change), returning a handle that
    /// unsubscribes when dropped.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribers
            .subscribe(move |value: &Arc<T>| callback(value.as_ref()))
    }

    /// Number of registered change callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.subscriber_count()
    }
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            path: Arc::clone(&self.path),
            subscribers: self.subscribers.clone(),
            registration: self.registration.clone(),
        }
    }
}

impl<T: std::fmt::Debug + Send + Sync + 'static> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("path", &self.path)
            .field("value", &self.get())
            .finish()
    }
}

fn decode_validated<T>(tree: &Tree, path: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let value: T = tree.decode(path)?;
    value.validate().map_err(|e| {
        ConfigError::ValidationError(format!("invalid configuration at path '{}': {}", path, e))
    })?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigLoader;
    use crate::error::ValidationError;
    use crate::sources::ConfigSource;
    use config::{Map, Value, ValueKind};
    use parking_lot::Mutex;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Limits {
        max: i64,
    }

    impl Validate for Limits {
        fn validate(&self) -> std::result::Result<(), ValidationError> {
            if self.max <= 0 {
                return Err(ValidationError::invalid_field("max", "must be positive"));
            }
            Ok(())
        }
    }

    struct Raw {
        value: Arc<Mutex<ValueKind>>,
    }

    impl ConfigSource for Raw {
        fn load(&self, _current: &Tree) -> Result<Map<String, Value>> {
            let mut limits = Map::new();
            limits.insert("max".to_string(), Value::new(None, self.value.lock().clone()));
            let mut root = Map::new();
            root.insert("limits".to_string(), Value::new(None, ValueKind::Table(limits)));
            Ok(root)
        }

        fn name(&self) -> String {
            "raw".to_string()
        }
    }

    fn store(initial: ValueKind) -> (ConfigStore, Arc<Mutex<ValueKind>>) {
        let value = Arc::new(Mutex::new(initial));
        let mut loader = ConfigLoader::new();
        loader.add_source(Box::new(Raw {
            value: Arc::clone(&value),
        }));
        (ConfigStore::load(loader).unwrap(), value)
    }

    #[test]
    fn test_standalone_binding() {
        let binding = Binding::new(5_u32);
        assert_eq!(*binding.get(), 5);
        assert_eq!(binding.path(), "");
        assert_eq!(binding.subscriber_count(), 0);
    }

    #[test]
    fn test_bind_matches_decode() {
        let (store, _) = store(ValueKind::I64(10));
        let binding: Binding<Limits> = store.bind("limits").unwrap();
        assert_eq!(*binding.get(), store.decode::<Limits>("limits").unwrap());
        assert_eq!(binding.path(), "limits");
    }

    #[test]
    fn test_bind_rejects_invalid() {
        let (store, _) = store(ValueKind::I64(-1));
        let err = Binding::<Limits>::bind(&store, "limits").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("limits"));
    }

    #[tokio::test]
    async fn test_reload_updates_and_notifies() {
        let (store, value) = store(ValueKind::I64(10));
        let binding: Binding<Limits> = store.bind("limits").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        binding.on_change(move |limits| seen_clone.lock().push(limits.max));

        *value.lock() = ValueKind::I64(20);
        store.reload().await.unwrap();

        assert_eq!(binding.get().max, 20);
        assert_eq!(*seen.lock(), vec![20]);
    }

    #[tokio::test]
    async fn test_rejected_reload_keeps_value() {
        let (store, value) = store(ValueKind::I64(10));
        let binding: Binding<Limits> = store.bind("limits").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        binding.on_change(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        *value.lock() = ValueKind::I64(0);
        store.reload().await.unwrap();
        assert_eq!(binding.get().max, 10);

        *value.lock() = ValueKind::String("lots".to_string());
        store.reload().await.unwrap();
        assert_eq!(binding.get().max, 10);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_callbacks() {
        let (store, value) = store(ValueKind::I64(10));
        let binding: Binding<Limits> = store.bind("limits").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let handle = binding.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.reload().await.unwrap();
        drop(handle);
        *value.lock() = ValueKind::I64(30);
        store.reload().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(binding.get().max, 30);
    }

    #[tokio::test]
    async fn test_dropping_all_clones_unregisters() {
        let (store, _) = store(ValueKind::I64(10));
        let binding: Binding<Limits> = store.bind("limits").unwrap();
        let clone = binding.clone();
        assert_eq!(store.notifier().len(), 1);

        drop(binding);
        assert_eq!(store.notifier().len(), 1);
        drop(clone);
        assert!(store.notifier().is_empty());
    }
}

//! The owner of the live configuration tree.

use crate::core::{Binding, ConfigLoader, Tree, Validate};
use crate::error::Result;
use crate::notify::{ReloadNotifier, SubscriptionHandle};
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// Holds the current [`Tree`] and rebuilds it on demand.
///
/// Reads are lock-free. [`reload`](ConfigStore::reload) is the only operation
/// that changes the tree: it assembles a complete new tree from the same
/// sources and swaps it in only if every source loaded. The reload notifier
/// then runs every registered callback in registration order.
///
/// # Examples
///
/// ```rust,no_run
/// use bootkit::core::{ConfigLoader, ConfigStore};
/// use bootkit::sources::FileSource;
///
/// # async fn example() -> bootkit::error::Result<()> {
/// let mut loader = ConfigLoader::new();
/// loader.add_source(Box::new(FileSource::new("config/bootkit.yaml")));
///
/// let store = ConfigStore::load(loader)?;
/// let port: u16 = store.decode("server.port")?;
///
/// store.reload().await?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigStore {
    current: ArcSwap<Tree>,
    loader: ConfigLoader,
    notifier: ReloadNotifier,
    reload_lock: Mutex<()>,
    #[cfg(feature = "metrics")]
    metrics: Option<ReloadMetrics>,
}

impl ConfigStore {
    /// Load the initial tree from `loader`.
    ///
    /// # Errors
    ///
    /// Returns the first source error. No store exists without a tree.
    pub fn load(loader: ConfigLoader) -> Result<Self> {
        let tree = loader.load()?;
        tracing::info!(
            sources = ?loader.source_names(),
            keys = tree.keys().len(),
            "configuration loaded"
        );

        Ok(Self {
            current: ArcSwap::from_pointee(tree),
            loader,
            notifier: ReloadNotifier::new(),
            reload_lock: Mutex::new(()),
            #[cfg(feature = "metrics")]
            metrics: None,
        })
    }

    /// Record reloads and binding rejections into `metrics`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: ReloadMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The current tree.
    pub fn tree(&self) -> Arc<Tree> {
        self.current.load_full()
    }

    /// Decode the sub-tree at `path` of the current tree.
    pub fn decode<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.current.load().decode(path)
    }

    /// Bind `path` as a live, validated value. See [`Binding::bind`].
    pub fn bind<T>(&self, path: &str) -> Result<Binding<T>>
    where
        T: DeserializeOwned + Validate + Send + Sync + 'static,
    {
        Binding::bind(self, path)
    }

    /// The notifier run after every successful reload.
    pub fn notifier(&self) -> &ReloadNotifier {
        &self.notifier
    }

    /// Register a callback run with the new tree after every successful reload.
    pub fn on_reload<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Tree) + Send + Sync + 'static,
    {
        self.notifier.on_reload(callback)
    }

    /// Files that contributed to the tree, for the watcher.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        self.loader.watched_files()
    }

    /// Rebuild the tree from every source.
    ///
    /// Concurrent reloads are serialized. On error the current tree stays in
    /// place and no callback runs.
    ///
    /// # Errors
    ///
    /// Returns the source error that stopped the rebuild.
    pub async fn reload(&self) -> Result<()> {
        let _guard = self.reload_lock.lock().await;

        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(|m| m.start_reload());

        let tree = match self.loader.load() {
            Ok(tree) => Arc::new(tree),
            Err(e) => {
                #[cfg(feature = "metrics")]
                if let (Some(metrics), Some(start)) = (&self.metrics, timer) {
                    metrics.record_reload_failure(start);
                }
                return Err(e);
            }
        };

        self.current.store(Arc::clone(&tree));

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(start)) = (&self.metrics, timer) {
            metrics.record_reload_success(start);
            metrics.update_tree_age();
            metrics.update_callback_count(self.notifier.len() as i64);
        }

        tracing::info!(callbacks = self.notifier.len(), "configuration reloaded");
        self.notifier.notify(&tree);
        Ok(())
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn metrics(&self) -> Option<&ReloadMetrics> {
        self.metrics.as_ref()
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("sources", &self.loader.source_names())
            .field("callbacks", &self.notifier.len())
            .finish()
    }
}

//! File watching for automatic configuration reloads.

use crate::error::{ConfigError, Result};
use crate::notify::debounce::debounce;
use crate::runtime::CancelToken;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default quiet period before a burst of file events triggers a reload.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Configuration watcher that monitors files for changes.
///
/// Each watched file is observed through its parent directory so that
/// atomic-rename saves are seen as well as in-place writes. Only write and
/// create events naming a watched file count. Events are debounced: a burst of
/// events produces a single callback once the burst has been quiet for the
/// debounce duration.
///
/// # Examples
///
/// ```rust,no_run
/// use bootkit::notify::ConfigWatcher;
/// use bootkit::runtime::CancelScope;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut watcher = ConfigWatcher::new(Duration::from_millis(100))?;
/// watcher.watch("/etc/bootkit/bootkit.yaml")?;
///
/// let scope = CancelScope::new();
/// tokio::spawn(watcher.run(scope.token(), || async {
///     println!("Config file changed, reload triggered!");
/// }));
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcher {
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<()>,
    debounce_duration: Duration,
    watched_dirs: HashSet<PathBuf>,
    watched_paths: Vec<PathBuf>,
    targets: Arc<RwLock<HashSet<PathBuf>>>,
}

impl ConfigWatcher {
    /// Create a new configuration watcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying file watcher cannot be created.
    pub fn new(debounce_duration: Duration) -> Result<Self> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let targets: Arc<RwLock<HashSet<PathBuf>>> = Arc::new(RwLock::new(HashSet::new()));

        let filter = Arc::clone(&targets);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "config watcher error");
                    return;
                }
            };

            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }

            let relevant = {
                let targets = filter.read();
                event.paths.iter().any(|p| targets.contains(p))
            };
            if relevant {
                tracing::debug!(paths = ?event.paths, kind = ?event.kind, "config file event");
                let _ = event_tx.send(());
            }
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        Ok(Self {
            watcher,
            events,
            debounce_duration,
            watched_dirs: HashSet::new(),
            watched_paths: Vec::new(),
            targets,
        })
    }

    /// Add a file to watch for changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be resolved or watched.
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let canonical_path = path.canonicalize().map_err(|e| {
            ConfigError::WatchError(format!("Failed to resolve path {}: {}", path.display(), e))
        })?;
        if canonical_path.file_name().is_none() {
            return Err(ConfigError::WatchError(format!(
                "Not a file path: {}",
                path.display()
            )));
        }

        // The name as it appears in its own directory, which differs from the
        // canonical path when the file is a symlink.
        let mut entries = vec![canonical_path.clone()];
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if let (Ok(dir), Some(name)) = (parent.canonicalize(), path.file_name()) {
            let entry = dir.join(name);
            if entry != canonical_path {
                entries.push(entry);
            }
        }

        for entry in entries {
            let Some(dir) = entry.parent().map(Path::to_path_buf) else {
                continue;
            };
            if self.watched_dirs.insert(dir.clone()) {
                self.watcher
                    .watch(&dir, RecursiveMode::NonRecursive)
                    .map_err(|e| {
                        ConfigError::WatchError(format!(
                            "Failed to watch {}: {}",
                            dir.display(),
                            e
                        ))
                    })?;
            }
            self.targets.write().insert(entry);
        }

        if !self.watched_paths.contains(&canonical_path) {
            self.watched_paths.push(canonical_path);
        }

        Ok(())
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }

    /// Get a list of currently watched files.
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched_paths
    }

    /// Drive the watcher until `cancel` fires.
    ///
    /// `on_change` runs once per debounced burst and is awaited before further
    /// events are handled. The OS watch handles are released when this returns.
    pub async fn run<F, Fut>(self, cancel: CancelToken, on_change: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let Self {
            watcher,
            events,
            debounce_duration,
            watched_paths,
            ..
        } = self;

        tracing::debug!(files = ?watched_paths, "config watcher started");
        debounce(events, debounce_duration, cancel, on_change).await;
        drop(watcher);
        tracing::debug!("config watcher stopped");
    }
}

//! The configuration loading module.

use crate::core::{ConfigLoader, ConfigStore};
use crate::runtime::{BoxError, InitContext, Module, ShutdownContext};
use crate::sources::{CliSource, DEFAULT_ENV_PREFIX, EnvSource, FileSource, discover_files};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "file-watch")]
use crate::notify::{ConfigWatcher, DEFAULT_DEBOUNCE};
#[cfg(feature = "file-watch")]
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// Directories searched for configuration files, in merge order.
pub const DEFAULT_CONFIG_DIRS: [&str; 3] = [".", "./config", "/etc/bootkit"];

/// Base name of discovered configuration files.
pub const DEFAULT_CONFIG_NAME: &str = "bootkit";

const FILE_PRIORITY_BASE: i32 = 100;
const FILE_PRIORITY_MAX: i32 = 299;

/// Loads the configuration tree and provides the [`ConfigStore`].
///
/// Add this module first: every later module reads its configuration from the
/// store it provides. Sources are merged in this order, later ones winning:
///
/// 1. files named `<name>.<ext>` found in the configuration directories,
///    followed by files added with [`with_file`](Self::with_file)
/// 2. environment variables starting with the prefix
/// 3. command-line flags, when arguments were given
///
/// With the `file-watch` feature the files are watched and every change
/// triggers a debounced reload.
///
/// # Examples
///
/// ```rust,no_run
/// use bootkit::modules::ConfigModule;
///
/// let config = ConfigModule::new()
///     .with_env_prefix("MYAPP_")
///     .with_config_dirs(["./config"])
///     .with_args(std::env::args().skip(1));
/// ```
pub struct ConfigModule {
    env_prefix: String,
    env_separator: String,
    env_vars: Option<Vec<(String, String)>>,
    config_dirs: Vec<PathBuf>,
    config_name: String,
    files: Vec<PathBuf>,
    args: Option<Vec<String>>,
    #[cfg(feature = "file-watch")]
    watch: bool,
    #[cfg(feature = "file-watch")]
    debounce: Duration,
    #[cfg(feature = "metrics")]
    metrics: Option<ReloadMetrics>,
    store: Option<Arc<ConfigStore>>,
    #[cfg(feature = "file-watch")]
    watch_task: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ConfigModule {
    /// A module with the default directories, file name and env prefix.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env_separator: "_".to_string(),
            env_vars: None,
            config_dirs: DEFAULT_CONFIG_DIRS.iter().map(PathBuf::from).collect(),
            config_name: DEFAULT_CONFIG_NAME.to_string(),
            files: Vec::new(),
            args: None,
            #[cfg(feature = "file-watch")]
            watch: true,
            #[cfg(feature = "file-watch")]
            debounce: DEFAULT_DEBOUNCE,
            #[cfg(feature = "metrics")]
            metrics: None,
            store: None,
            #[cfg(feature = "file-watch")]
            watch_task: parking_lot::Mutex::new(None),
        }
    }

    /// Prefix of environment variables that override configuration.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Separator between path segments in environment variable names.
    pub fn with_env_separator(mut self, separator: impl Into<String>) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Read overrides from `vars` instead of the process environment.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Directories searched for configuration files, lowest precedence first.
    pub fn with_config_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.config_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Base name of configuration files, without extension.
    pub fn with_config_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = name.into();
        self
    }

    /// Add a configuration file that must exist. Explicit files override
    /// discovered ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Command-line arguments, without the program name. Flags named after
    /// existing keys override them (`--server.port=8080`).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable reloading when configuration files change.
    #[cfg(feature = "file-watch")]
    pub fn with_watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    /// Quiet period after the last file event before a reload.
    #[cfg(feature = "file-watch")]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Record reload metrics with `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(ReloadMetrics::new(meter));
        self
    }

    /// The store, once the module has been initialized.
    pub fn store(&self) -> Option<&Arc<ConfigStore>> {
        self.store.as_ref()
    }

    /// Assemble the loader for the configured sources.
    pub fn loader(&self) -> ConfigLoader {
        let mut files = discover_files(self.config_dirs.as_slice(), &self.config_name);
        files.extend(self.files.iter().cloned());

        let mut loader = ConfigLoader::new();
        for (index, path) in files.into_iter().enumerate() {
            let priority = (FILE_PRIORITY_BASE + index as i32).min(FILE_PRIORITY_MAX);
            loader.add_source(Box::new(FileSource::new(path).with_priority(priority)));
        }

        let mut env = EnvSource::new(&self.env_prefix, &self.env_separator);
        if let Some(vars) = &self.env_vars {
            env = env.with_vars(vars.iter().cloned());
        }
        loader.add_source(Box::new(env));

        if let Some(args) = &self.args {
            loader.add_source(Box::new(CliSource::new(args.iter().cloned())));
        }
        loader
    }

    /// Watch `files` and reload `store` whenever they change.
    ///
    /// A watcher that cannot be set up is logged and skipped; the module keeps
    /// serving the configuration it loaded.
    #[cfg(feature = "file-watch")]
    fn start_watcher(
        &self,
        store: &Arc<ConfigStore>,
        files: &[PathBuf],
        cancel: crate::runtime::CancelToken,
    ) {
        if files.is_empty() {
            tracing::debug!("no configuration files to watch");
            return;
        }

        let watcher = ConfigWatcher::new(self.debounce).and_then(|mut watcher| {
            for file in files {
                watcher.watch(file)?;
            }
            Ok(watcher)
        });
        let watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "configuration files will not be watched, changes need a restart"
                );
                return;
            }
        };

        let store = Arc::clone(store);
        let task = tokio::spawn(watcher.run(cancel, move || {
            let store = Arc::clone(&store);
            async move {
                match store.reload().await {
                    Ok(()) => tracing::info!("configuration reloaded after file change"),
                    Err(e) => tracing::error!(
                        error = %e,
                        "configuration reload failed, keeping previous configuration"
                    ),
                }
            }
        }));

        tracing::info!(files = ?files, "watching configuration files");
        *self.watch_task.lock() = Some(task);
    }
}

impl Default for ConfigModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for ConfigModule {
    async fn init(&mut self, ctx: &mut InitContext) -> Result<(), BoxError> {
        let store = ConfigStore::load(self.loader())?;

        #[cfg(feature = "metrics")]
        let store = match self.metrics.clone() {
            Some(metrics) => store.with_metrics(metrics),
            None => store,
        };

        let store = Arc::new(store);

        #[cfg(feature = "file-watch")]
        if self.watch {
            self.start_watcher(&store, &store.watched_files(), ctx.cancel_token());
        }

        ctx.provide(Arc::clone(&store));
        self.store = Some(store);
        Ok(())
    }

    async fn shutdown(&self, _ctx: ShutdownContext) -> Result<(), BoxError> {
        #[cfg(feature = "file-watch")]
        {
            let task = self.watch_task.lock().take();
            if let Some(task) = task {
                // The watcher follows the run token, which is cancelled before
                // shutdown starts.
                match tokio::time::timeout_at(_ctx.deadline(), task).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, "configuration watcher ended abnormally");
                        return Err(e.into());
                    }
                    Err(_) => {
                        tracing::warn!("configuration watcher did not stop before the deadline")
                    }
                }
            }
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "config"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CancelScope;
    use std::fs;
    use tempfile::TempDir;

    fn isolated(dir: &TempDir) -> ConfigModule {
        ConfigModule::new()
            .with_config_dirs([dir.path()])
            .with_env_vars(Vec::<(String, String)>::new())
    }

    #[test]
    fn test_loader_sources_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bootkit.yaml"), "app:\n  limit: 1\n").unwrap();
        fs::write(dir.path().join("bootkit.toml"), "[app]\nlimit = 2\n").unwrap();
        let extra = dir.path().join("extra.json");
        fs::write(&extra, r#"{"app": {"limit": 3}}"#).unwrap();

        let module = isolated(&dir).with_file(&extra).with_args(["--app.limit=4"]);
        let names = module.loader().source_names();

        assert_eq!(names.len(), 5);
        assert!(names[0].ends_with("bootkit.yaml"));
        assert!(names[1].ends_with("bootkit.toml"));
        assert!(names[2].ends_with("extra.json"));
        assert!(names[3].starts_with("env:"));
        assert_eq!(names[4], "cli");

        let tree = module.loader().load().unwrap();
        assert_eq!(tree.decode::<i64>("app.limit").unwrap(), 4);
    }

    #[tokio::test]
    async fn test_init_provides_store() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bootkit.yaml"), "app:\n  limit: 100\n").unwrap();

        let mut module = isolated(&dir)
            .with_env_vars([("BOOTKIT_APP_LIMIT", "200")]);
        let scope = CancelScope::new();
        let mut ctx = InitContext::new(scope.token());

        module.init(&mut ctx).await.unwrap();

        let store = ctx.config().unwrap();
        assert_eq!(store.decode::<i64>("app.limit").unwrap(), 200);
        assert!(module.store().is_some());
    }

    #[tokio::test]
    async fn test_init_fails_on_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let mut module = isolated(&dir)
            .with_file(dir.path().join("missing.yaml"));
        let scope = CancelScope::new();
        let mut ctx = InitContext::new(scope.token());

        assert!(module.init(&mut ctx).await.is_err());
        assert!(ctx.config().is_err());
    }

    #[cfg(feature = "file-watch")]
    #[tokio::test]
    async fn test_shutdown_stops_watcher() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bootkit.yaml"), "app:\n  limit: 1\n").unwrap();

        let mut module = isolated(&dir);
        let scope = CancelScope::new();
        let mut ctx = InitContext::new(scope.token());
        module.init(&mut ctx).await.unwrap();
        assert!(module.watch_task.lock().is_some());

        scope.cancel();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        module.shutdown(ShutdownContext::new(deadline)).await.unwrap();
        assert!(module.watch_task.lock().is_none());
    }

    #[cfg(feature = "file-watch")]
    #[tokio::test]
    async fn test_unwatchable_files_keep_serving() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bootkit.yaml"), "app:\n  limit: 1\n").unwrap();

        let module = isolated(&dir);
        let store = Arc::new(ConfigStore::load(module.loader()).unwrap());
        let scope = CancelScope::new();

        let gone = dir.path().join("removed").join("bootkit.yaml");
        module.start_watcher(&store, &[gone], scope.token());

        assert!(module.watch_task.lock().is_none());
        assert_eq!(store.decode::<i64>("app.limit").unwrap(), 1);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        module.shutdown(ShutdownContext::new(deadline)).await.unwrap();
    }

    #[cfg(feature = "file-watch")]
    #[tokio::test]
    async fn test_shutdown_reports_crashed_watcher() {
        let dir = TempDir::new().unwrap();
        let module = isolated(&dir);
        *module.watch_task.lock() = Some(tokio::spawn(async {
            if true {
                panic!("watcher crashed");
            }
        }));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        let err = module.shutdown(ShutdownContext::new(deadline)).await.unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }
}

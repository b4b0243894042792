//! Log output through `tracing-subscriber`.

use crate::core::{Tree, Validate, category, module_path};
use crate::error::ValidationError;
use crate::runtime::{BoxError, InitContext, Module, ShutdownContext};
use async_trait::async_trait;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Output layout of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single line with all fields.
    #[default]
    Full,
    /// Shorter single line.
    Compact,
    /// Multi-line, for local development.
    Pretty,
}

/// Settings read from `modules.logging.tracing.<instance>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `bootkit=debug,warn`.
    pub level: String,
    /// Line layout.
    pub format: LogFormat,
    /// Whether to emit ANSI colors.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            ansi: true,
        }
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|e| ValidationError::invalid_field("level", e.to_string()))
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. If another subscriber
/// is already installed it is left in place and a warning is logged.
pub struct LoggingModule {
    name: String,
    config: LoggingConfig,
    installed: bool,
}

impl LoggingModule {
    /// A module with the default instance name and settings.
    pub fn new() -> Self {
        Self {
            name: crate::core::DEFAULT_INSTANCE_NAME.to_string(),
            config: LoggingConfig::default(),
            installed: false,
        }
    }

    /// Instance name, selecting the configuration sub-tree.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Settings used when the tree has none for this instance.
    pub fn with_config(mut self, config: LoggingConfig) -> Self {
        self.config = config;
        self
    }

    /// Current settings.
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Returns `true` if this module installed the global subscriber.
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    fn install(&self) -> bool {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.config.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);
        let layer = tracing_subscriber::fmt::layer().with_ansi(self.config.ansi);

        let result = match self.config.format {
            LogFormat::Full => registry.with(layer).try_init(),
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "a global tracing subscriber is already installed");
                false
            }
        }
    }
}

impl Default for LoggingModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for LoggingModule {
    async fn init(&mut self, _ctx: &mut InitContext) -> Result<(), BoxError> {
        self.installed = self.install();
        if self.installed {
            tracing::info!(
                level = %self.config.level,
                format = ?self.config.format,
                "logging initialized"
            );
        }
        Ok(())
    }

    async fn shutdown(&self, _ctx: ShutdownContext) -> Result<(), BoxError> {
        Ok(())
    }

    fn config_path(&self) -> Option<String> {
        Some(module_path(category::LOGGING, "tracing", &self.name))
    }

    fn load_config(&mut self, tree: &Tree) -> Result<(), BoxError> {
        let Some(path) = self.config_path() else {
            return Ok(());
        };
        let config: LoggingConfig = tree.decode(&path)?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn kind(&self) -> &'static str {
        "logging"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Value, ValueKind};

    fn tree_with(entries: &[(&str, ValueKind)]) -> Tree {
        let mut tree = Tree::new();
        for (path, kind) in entries {
            tree.set(path, Value::new(None, kind.clone()));
        }
        tree
    }

    #[test]
    fn test_config_path_uses_instance() {
        let module = LoggingModule::new();
        assert_eq!(
            module.config_path().as_deref(),
            Some("modules.logging.tracing.default")
        );

        let module = LoggingModule::new().with_name("audit");
        assert_eq!(
            module.config_path().as_deref(),
            Some("modules.logging.tracing.audit")
        );
    }

    #[test]
    fn test_load_config_from_tree() {
        let tree = tree_with(&[
            (
                "modules.logging.tracing.default.level",
                ValueKind::String("debug".to_string()),
            ),
            (
                "modules.logging.tracing.default.format",
                ValueKind::String("compact".to_string()),
            ),
        ]);

        let mut module = LoggingModule::new();
        module.load_config(&tree).unwrap();

        assert_eq!(module.config().level, "debug");
        assert_eq!(module.config().format, LogFormat::Compact);
        assert!(module.config().ansi);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let tree = tree_with(&[(
            "modules.logging.tracing.default.level",
            ValueKind::String("app=loud".to_string()),
        )]);

        let mut module = LoggingModule::new();
        assert!(module.load_config(&tree).is_err());
        assert_eq!(module.config(), &LoggingConfig::default());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let tree = tree_with(&[(
            "modules.logging.tracing.default.format",
            ValueKind::String("xml".to_string()),
        )]);

        let mut module = LoggingModule::new();
        assert!(module.load_config(&tree).is_err());
    }
}

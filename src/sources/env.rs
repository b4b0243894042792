//! Environment variable configuration source.

use super::ConfigSource;
use crate::core::Tree;
use crate::error::{ConfigError, Result};
use config::{Environment, Map, Source, Value};

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "BOOTKIT_";

/// Environment variable configuration source.
///
/// A variable named `<PREFIX><PATH>` sets the dotted path obtained by stripping
/// the prefix, lower-casing, and replacing the word separator with `.`.
/// Values are parsed as booleans or numbers when possible.
///
/// # Examples
///
/// ```rust
/// use bootkit::sources::EnvSource;
///
/// // BOOTKIT_APP_LIMIT=200 -> app.limit = 200
/// let source = EnvSource::new("BOOTKIT_", "_");
/// ```
pub struct EnvSource {
    prefix: String,
    separator: String,
    vars: Option<Map<String, String>>,
    priority: i32,
}

impl EnvSource {
    /// Create a new environment variable source.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Full variable prefix including any trailing separator (e.g., "APP_")
    /// * `separator` - Separator between path segments (e.g., "_" for APP_DB_HOST)
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            vars: None,
            priority: 300, // Above files, below command-line flags
        }
    }

    /// Read from an explicit variable map instead of the process environment.
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Set the priority for this source.
    ///
    /// Higher priority sources override lower priority ones.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ConfigSource for EnvSource {
    fn load(&self, _current: &Tree) -> Result<Map<String, Value>> {
        let env_source = Environment::with_prefix(&self.prefix)
            .prefix_separator("")
            .separator(&self.separator)
            .try_parsing(true)
            .source(self.vars.clone());

        let parsed = config::Config::builder()
            .add_source(env_source)
            .build()
            .map_err(|e| {
                ConfigError::LoadError(format!(
                    "Failed to load environment variables ({}): {}",
                    self.name(),
                    e
                ))
            })?;

        parsed.collect().map_err(|e| {
            ConfigError::ParseError(format!(
                "Failed to parse environment variables ({}): {}",
                self.name(),
                e
            ))
        })
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

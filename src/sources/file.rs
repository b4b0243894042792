//! File-based configuration source.

use super::ConfigSource;
use crate::core::Tree;
use crate::error::{ConfigError, Result};
use config::{File, FileFormat, Map, Source, Value};
use std::path::{Path, PathBuf};

/// Extensions tried during discovery, in merge order.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["yaml", "yml", "json", "toml"];

/// File-based configuration source.
///
/// Loads configuration from YAML, TOML, or JSON files with automatic format detection
/// based on file extension.
///
/// # Examples
///
/// ```rust,no_run
/// use bootkit::sources::FileSource;
///
/// let source = FileSource::new("config/bootkit.yaml");
/// ```
pub struct FileSource {
    path: PathBuf,
    priority: i32,
}

impl FileSource {
    /// Create a new file source with automatic format detection.
    ///
    /// The format is detected from the file extension:
    /// - `.yaml`, `.yml` -> YAML
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
        }
    }

    /// Set the priority for this source.
    ///
    /// Higher priority sources override lower priority ones.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The path this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the parser for this file's extension.
    fn format(&self) -> Result<FileFormat> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            "toml" => Ok(FileFormat::Toml),
            "json" => Ok(FileFormat::Json),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self, _current: &Tree) -> Result<Map<String, Value>> {
        let format = self.format()?;

        if !self.path.exists() {
            return Err(ConfigError::LoadError(format!(
                "Configuration file not found: {}",
                self.path.display()
            )));
        }

        let parsed = config::Config::builder()
            .add_source(File::from(self.path.clone()).format(format).required(true))
            .build()
            .map_err(|e| {
                ConfigError::LoadError(format!(
                    "Failed to load file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        parsed.collect().map_err(|e| {
            ConfigError::ParseError(format!(
                "Failed to parse file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Find `<dir>/<name>.<ext>` files that exist.
///
/// Directories are searched in the given order and, within a directory,
/// extensions in [`SUPPORTED_EXTENSIONS`] order. The result is also the merge
/// order, so later directories override earlier ones.
pub fn discover_files<P: AsRef<Path>>(dirs: &[P], name: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in dirs {
        for ext in SUPPORTED_EXTENSIONS {
            let path = dir.as_ref().join(format!("{}.{}", name, ext));
            if path.is_file() {
                files.push(path);
            }
        }
    }
    files
}

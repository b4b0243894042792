//! Configuration loader that merges multiple sources.

use crate::core::Tree;
use crate::error::{ConfigError, Result};
use crate::sources::ConfigSource;
use std::path::PathBuf;

/// Loads and merges configuration from multiple sources.
///
/// The loader handles precedence by sorting sources by priority and merging them
/// in order (lower priority first, higher priority sources override). Sources
/// with equal priority keep the order they were added in.
pub struct ConfigLoader {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Add a configuration source.
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        self.sources.push(source);
    }

    fn sorted(&self) -> Vec<&dyn ConfigSource> {
        let mut sorted: Vec<&dyn ConfigSource> = self.sources.iter().map(|s| s.as_ref()).collect();
        sorted.sort_by_key(|s| s.priority());
        sorted
    }

    /// Build a fresh tree from every source.
    ///
    /// Each source sees the tree assembled from the sources before it. Any
    /// failing source aborts the whole load; no partial tree is returned.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first source that failed.
    pub fn load(&self) -> Result<Tree> {
        let mut tree = Tree::new();

        for source in self.sorted() {
            let values = source.load(&tree).map_err(|e| {
                ConfigError::LoadError(format!("Failed to load source '{}': {}", source.name(), e))
            })?;
            tree.merge(values);
        }

        Ok(tree)
    }

    /// Get the list of source names in priority order.
    pub fn source_names(&self) -> Vec<String> {
        self.sorted().iter().map(|s| s.name()).collect()
    }

    /// Files that contributed to the tree, in merge order.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        self.sorted()
            .iter()
            .filter_map(|s| s.watch_path().map(PathBuf::from))
            .collect()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

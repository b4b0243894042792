//! Configuration source trait.

use crate::core::Tree;
use crate::error::Result;
use config::{Map, Value};
use std::path::Path;

/// Trait for configuration sources.
///
/// Implement this trait to add custom configuration origins. A source returns a
/// partial map that the loader merges over everything loaded before it.
pub trait ConfigSource: Send + Sync {
    /// Load this source's contribution.
    ///
    /// `current` is the tree assembled from all lower-priority sources so far.
    /// Most sources ignore it; command-line overrides use it to learn which
    /// keys exist and what type each one has.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    fn load(&self, current: &Tree) -> Result<Map<String, Value>>;

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;

    /// Get the priority of this source (higher = takes precedence).
    ///
    /// Default priorities:
    /// - Command-line flags: 400
    /// - Environment variables: 300
    /// - Files: 100 upwards, in discovery order
    fn priority(&self) -> i32 {
        100
    }

    /// The file backing this source, if any. Used to decide what to watch.
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}

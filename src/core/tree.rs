//! The merged configuration tree.

use crate::error::{ConfigError, Result};
use config::{Map, Value, ValueKind};
use serde::de::DeserializeOwned;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '.';

/// Hierarchical configuration assembled from all sources.
///
/// Keys are stored normalized: lower-cased, with dotted keys expanded into
/// nested tables. A `Tree` handed out by [`ConfigStore`](crate::core::ConfigStore)
/// is never mutated; reloads build a fresh one and swap it in.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    root: Map<String, Value>,
}

/// Split a dotted key into normalized segments.
///
/// Empty segments are dropped and every segment is lower-cased, so
/// `"App..Limit"` and `"app.limit"` address the same leaf.
pub fn normalize_key(key: &str) -> Vec<String> {
    key.split(PATH_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn empty_table() -> Value {
    Value::new(None, ValueKind::Table(Map::new()))
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no source contributed any key.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Merge a partial map into this tree.
    ///
    /// Tables merge recursively; every other value replaces whatever was stored
    /// at its leaf, so the last merged source wins per leaf.
    pub fn merge(&mut self, values: Map<String, Value>) {
        for (key, value) in values {
            let segments = normalize_key(&key);
            merge_into(&mut self.root, &segments, value);
        }
    }

    /// Set a single value at a dotted path.
    pub fn set(&mut self, path: &str, value: Value) {
        let segments = normalize_key(path);
        merge_into(&mut self.root, &segments, value);
    }

    /// Look up the value at a dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments = normalize_key(path);
        let (last, parents) = segments.split_last()?;

        let mut table = &self.root;
        for segment in parents {
            match table.get(segment).map(|v| &v.kind) {
                Some(ValueKind::Table(inner)) => table = inner,
                _ => return None,
            }
        }
        table.get(last)
    }

    /// Returns `true` if a value (leaf or table) exists at the path.
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// All leaf paths, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        collect_leaves(&self.root, "", &mut keys);
        keys.sort();
        keys
    }

    /// Decode the sub-tree at `path` into `T`.
    ///
    /// An empty path decodes the whole tree. A missing path decodes from an
    /// empty table, so types with `#[serde(default)]` fall back to defaults.
    pub fn decode<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = if normalize_key(path).is_empty() {
            Value::new(None, ValueKind::Table(self.root.clone()))
        } else {
            self.get(path).cloned().unwrap_or_else(empty_table)
        };

        value.try_deserialize::<T>().map_err(|e| {
            ConfigError::DeserializationError(format!(
                "failed to decode configuration at path '{}': {}",
                path, e
            ))
        })
    }
}

fn merge_into(table: &mut Map<String, Value>, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        // A table merged at the root spreads its entries; scalars have no key.
        if let ValueKind::Table(entries) = value.kind {
            for (key, inner) in entries {
                merge_into(table, &normalize_key(&key), inner);
            }
        }
        return;
    };

    if rest.is_empty() {
        match value.kind {
            ValueKind::Table(entries) => {
                let slot = table.entry(head.clone()).or_insert_with(empty_table);
                if !matches!(slot.kind, ValueKind::Table(_)) {
                    *slot = empty_table();
                }
                if let ValueKind::Table(inner) = &mut slot.kind {
                    for (key, nested) in entries {
                        merge_into(inner, &normalize_key(&key), nested);
                    }
                }
            }
            kind => {
                table.insert(head.clone(), Value::new(None, kind));
            }
        }
        return;
    }

    let slot = table.entry(head.clone()).or_insert_with(empty_table);
    if !matches!(slot.kind, ValueKind::Table(_)) {
        *slot = empty_table();
    }
    if let ValueKind::Table(inner) = &mut slot.kind {
        merge_into(inner, rest, value);
    }
}

fn collect_leaves(table: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", prefix, PATH_SEPARATOR, key)
        };
        match &value.kind {
            ValueKind::Table(inner) => collect_leaves(inner, &path, out),
            _ => out.push(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    fn int(v: i64) -> Value {
        Value::new(None, ValueKind::I64(v))
    }

    fn text(v: &str) -> Value {
        Value::new(None, ValueKind::String(v.to_string()))
    }

    fn map(entries: Vec<(&str, Value)>) -> Map<String, Value> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("App..Limit"), vec!["app", "limit"]);
        assert_eq!(normalize_key(".server.port."), vec!["server", "port"]);
        assert!(normalize_key("").is_empty());
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut tree = Tree::new();
        tree.merge(map(vec![("app.limit", int(100)), ("app.name", text("a"))]));
        tree.merge(map(vec![("APP.LIMIT", int(200))]));

        assert_eq!(tree.decode::<i64>("app.limit").unwrap(), 200);
        assert_eq!(tree.decode::<String>("app.name").unwrap(), "a");
    }

    #[test]
    fn test_merge_nested_tables_keeps_siblings() {
        let mut tree = Tree::new();
        let server = Value::new(
            None,
            ValueKind::Table(map(vec![("port", int(8080)), ("host", text("localhost"))])),
        );
        tree.merge(map(vec![("server", server)]));

        let override_port = Value::new(None, ValueKind::Table(map(vec![("port", int(9090))])));
        tree.merge(map(vec![("server", override_port)]));

        assert_eq!(tree.decode::<i64>("server.port").unwrap(), 9090);
        assert_eq!(tree.decode::<String>("server.host").unwrap(), "localhost");
    }

    #[test]
    fn test_scalar_replaced_by_table() {
        let mut tree = Tree::new();
        tree.set("db", text("sqlite"));
        tree.set("db.url", text("postgres://localhost"));

        assert_eq!(tree.keys(), vec!["db.url"]);
    }

    #[test]
    fn test_keys_sorted_leaves() {
        let mut tree = Tree::new();
        tree.set("b.y", int(1));
        tree.set("a", int(2));
        tree.set("b.x", int(3));

        assert_eq!(tree.keys(), vec!["a", "b.x", "b.y"]);
    }

    #[test]
    fn test_get_and_exists() {
        let mut tree = Tree::new();
        tree.set("modules.http.server.default.port", int(80));

        assert!(tree.exists("modules.http.server"));
        assert!(tree.exists("Modules.HTTP.Server.Default.Port"));
        assert!(!tree.exists("modules.grpc"));
        assert!(tree.get("modules.http.server.default.port.extra").is_none());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Limits {
        #[serde(default = "default_max")]
        max_requests: i64,
    }

    fn default_max() -> i64 {
        10
    }

    #[test]
    fn test_decode_missing_path_uses_defaults() {
        let tree = Tree::new();
        let limits: Limits = tree.decode("app.limits").unwrap();
        assert_eq!(limits, Limits { max_requests: 10 });
    }

    #[test]
    fn test_decode_error_names_path() {
        let mut tree = Tree::new();
        tree.set("app.limits.max_requests", text("lots"));

        let err = tree.decode::<Limits>("app.limits").unwrap_err();
        assert!(err.to_string().contains("app.limits"));
    }

    #[test]
    fn test_decode_root() {
        let mut tree = Tree::new();
        tree.set("max_requests", int(7));
        let limits: Limits = tree.decode("").unwrap();
        assert_eq!(limits.max_requests, 7);
    }

    proptest! {
        #[test]
        fn prop_last_source_defining_leaf_wins(
            sources in proptest::collection::vec(
                proptest::collection::btree_map("[a-c]\\.[x-z]", 0i64..1000, 0..4),
                1..6,
            )
        ) {
            let mut tree = Tree::new();
            for source in &sources {
                tree.merge(source.iter().map(|(k, v)| (k.clone(), int(*v))).collect());
            }

            for key in tree.keys() {
                let expected = sources
                    .iter()
                    .rev()
                    .find_map(|source| source.get(&key))
                    .copied();
                prop_assert_eq!(Some(tree.decode::<i64>(&key).unwrap()), expected);
            }
        }
    }
}

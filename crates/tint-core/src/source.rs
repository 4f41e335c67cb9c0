//! Source tracking and change detection.
//!
//! The registry remembers, per logical source name, the exact bytes that
//! were last accepted and the JSON value parsed from them. A source only
//! counts as changed when its bytes differ from that snapshot.

use crate::error::{Result, ThemeError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Returns true iff the two byte sequences differ.
///
/// No normalization happens here. Identical rewrites are unchanged and any
/// formatting difference is a change, which is what lets identifier
/// write-back settle after one extra pass.
pub fn has_changed(previous: &[u8], candidate: &[u8]) -> bool {
    previous != candidate
}

/// Everything the pipeline knows about one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    /// Logical name from the config.
    pub name: String,

    /// Canonical path of the source file.
    pub path: PathBuf,

    /// Bytes most recently accepted for this source. Empty until the first run.
    pub last_raw: Vec<u8>,

    /// Value parsed from `last_raw`. An empty object until the first run.
    pub last_value: Value,
}

/// Holds one descriptor per configured source.
///
/// The set of names is fixed once the pipeline is built.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceDescriptor>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source with empty placeholders.
    ///
    /// Fails if the name is taken or the path doesn't exist right now.
    pub fn register(&mut self, name: impl Into<String>, path: &Path) -> Result<()> {
        let name = name.into();

        if self.sources.contains_key(&name) {
            return Err(ThemeError::config(format!(
                "source '{}' is registered twice",
                name
            )));
        }

        let path = path.canonicalize().map_err(|_| {
            ThemeError::config(format!(
                "could not locate file referenced by source '{}': {}",
                name,
                path.display()
            ))
        })?;

        self.sources.insert(
            name.clone(),
            SourceDescriptor {
                name,
                path,
                last_raw: Vec::new(),
                last_value: Value::Object(Default::default()),
            },
        );

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.get(name)
    }

    /// Replaces the stored bytes and value for `name`.
    ///
    /// Callers only do this after a change was detected. Returns false if
    /// the name isn't registered.
    pub fn update(&mut self, name: &str, raw: Vec<u8>, value: Value) -> bool {
        match self.sources.get_mut(name) {
            Some(descriptor) => {
                descriptor.last_raw = raw;
                descriptor.last_value = value;
                true
            }
            None => false,
        }
    }

    /// Finds the source whose canonical path is `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<&SourceDescriptor> {
        self.sources.values().find(|d| d.path == path)
    }

    /// Iterates descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.sources.values().map(|d| d.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Current name -> value mapping, including untouched sources.
    pub fn values(&self) -> BTreeMap<String, Value> {
        self.sources
            .iter()
            .map(|(name, d)| (name.clone(), d.last_value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_has_changed_is_byte_exact() {
        assert!(!has_changed(b"", b""));
        assert!(!has_changed(b"[1, 2]", b"[1, 2]"));
        assert!(has_changed(b"[1, 2]", b"[1,2]"));
        assert!(has_changed(b"[1]", b"[1]\n"));
        assert!(has_changed(b"", b"[]"));
    }

    #[test]
    fn test_register_and_get() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("values.json");
        fs::write(&path, "[]").unwrap();

        let mut registry = SourceRegistry::new();
        registry.register("values", &path).unwrap();

        let descriptor = registry.get("values").unwrap();
        assert_eq!(descriptor.path, path.canonicalize().unwrap());
        assert!(descriptor.last_raw.is_empty());
        assert_eq!(descriptor.last_value, json!({}));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_duplicates_and_missing_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("values.json");
        fs::write(&path, "[]").unwrap();

        let mut registry = SourceRegistry::new();
        registry.register("values", &path).unwrap();

        let dup = registry.register("values", &path).unwrap_err();
        assert!(dup.is_fatal());

        let missing = registry
            .register("variants", &dir.path().join("variants.json"))
            .unwrap_err();
        assert!(missing.is_fatal());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_update_and_lookup_by_path() {
        let dir = tempdir().unwrap();
        let values = dir.path().join("values.json");
        let variants = dir.path().join("variants.json");
        fs::write(&values, "[]").unwrap();
        fs::write(&variants, "[]").unwrap();

        let mut registry = SourceRegistry::new();
        registry.register("values", &values).unwrap();
        registry.register("variants", &variants).unwrap();

        assert!(registry.update("values", b"[1]".to_vec(), json!([1])));
        assert!(!registry.update("unknown", Vec::new(), json!(null)));

        let found = registry
            .find_by_path(&variants.canonicalize().unwrap())
            .unwrap();
        assert_eq!(found.name, "variants");

        let values_map = registry.values();
        assert_eq!(values_map["values"], json!([1]));
        assert_eq!(values_map["variants"], json!({}));
    }
}

//! Identifier back-filling for record collections.
//!
//! Theme sources such as `values.json` hold arrays of records that the
//! editor tooling addresses by id. Records added by hand usually lack
//! one, so we assign a fresh identifier and write the file back.

use crate::error::{Result, ThemeError};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Produces globally unique identifier strings.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

/// Random v4 UUIDs in hyphenated form (36 characters).
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Assigns identifiers to records that are missing one.
pub struct IdentifierBackfiller {
    field: String,
    generator: Box<dyn IdGenerator>,
}

impl std::fmt::Debug for IdentifierBackfiller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierBackfiller")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

impl IdentifierBackfiller {
    /// Creates a backfiller for `field` using random UUIDs.
    pub fn new(field: impl Into<String>) -> Self {
        Self::with_generator(field, UuidGenerator)
    }

    pub fn with_generator(field: impl Into<String>, generator: impl IdGenerator + 'static) -> Self {
        Self {
            field: field.into(),
            generator: Box::new(generator),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Assigns identifiers in place and returns how many were assigned.
    ///
    /// Only arrays are eligible. Elements that aren't objects are not
    /// records and are left alone.
    pub fn assign(&self, value: &mut Value) -> usize {
        let Value::Array(items) = value else {
            return 0;
        };

        let mut assigned = 0;
        for (index, item) in items.iter_mut().enumerate() {
            let Value::Object(record) = item else {
                debug!("Skipping non-record element at index {}", index);
                continue;
            };

            if needs_id(record, &self.field) {
                record.insert(self.field.clone(), Value::String(self.generator.generate()));
                assigned += 1;
            }
        }

        assigned
    }

    /// Counts records that `assign` would touch, without modifying anything.
    pub fn count_missing(&self, value: &Value) -> usize {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_object)
                .filter(|record| needs_id(record, &self.field))
                .count(),
            _ => 0,
        }
    }

    /// Back-fills a copy of `value` and writes it to `path` if anything
    /// was assigned.
    ///
    /// The caller's value is not modified; the rewritten file is picked up
    /// by the next change notification. Returns the number of identifiers
    /// assigned.
    pub fn backfill_file(&self, name: &str, path: &Path, value: &Value) -> Result<usize> {
        if !value.is_array() {
            return Ok(0);
        }

        let mut updated = value.clone();
        let assigned = self.assign(&mut updated);
        if assigned == 0 {
            return Ok(0);
        }

        let serialized = serde_json::to_string_pretty(&updated)
            .map_err(|e| ThemeError::write(path, std::io::Error::other(e)))?;
        fs::write(path, serialized).map_err(|e| ThemeError::write(path, e))?;

        info!(
            "Assigned {} missing '{}' value(s) in {} ({})",
            assigned,
            self.field,
            name,
            path.display()
        );

        Ok(assigned)
    }
}

/// Missing, `null`, `false`, zero and the empty string all count as no id.
fn needs_id(record: &Map<String, Value>, field: &str) -> bool {
    match record.get(field) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

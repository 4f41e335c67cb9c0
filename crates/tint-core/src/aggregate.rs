//! The aggregation seam.
//!
//! Turning parsed sources into a theme object is someone else's job; the
//! pipeline only needs a pure function from name -> value to a single value.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parsed sources keyed by logical name.
pub type SourceValues = BTreeMap<String, Value>;

/// Merges every source into the theme object.
///
/// Implementations must be pure: the same input always yields the same
/// theme.
pub trait Aggregator: Send {
    fn aggregate(&self, sources: &SourceValues) -> Value;
}

impl<F> Aggregator for F
where
    F: Fn(&SourceValues) -> Value + Send,
{
    fn aggregate(&self, sources: &SourceValues) -> Value {
        self(sources)
    }
}

/// Emits every source under its logical name, unchanged.
///
/// Used when no theme processor is plugged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceMapAggregator;

impl Aggregator for SourceMapAggregator {
    fn aggregate(&self, sources: &SourceValues) -> Value {
        let mut theme = Map::new();
        for (name, value) in sources {
            theme.insert(name.clone(), value.clone());
        }
        Value::Object(theme)
    }
}

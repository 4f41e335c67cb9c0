//! Tint Core - change detection and theme regeneration
//!
//! This crate owns the stateful part of Tint: it tracks every configured
//! theme source, decides when one really changed, back-fills missing record
//! identifiers, and writes the compiled theme artifact.
//!
//! # Example
//!
//! ```no_run
//! use tint_core::{RegenerationPipeline, SourceMapAggregator, ThemeConfig};
//! use std::path::Path;
//!
//! let config = ThemeConfig::load(Path::new("tint.config.json"), Path::new(".")).unwrap();
//! let mut pipeline = RegenerationPipeline::new(config, SourceMapAggregator).unwrap();
//! let report = pipeline.run().unwrap();
//! println!("changed: {:?}", report.changed);
//! ```

pub mod aggregate;
pub mod artifact;
pub mod backfill;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod source;

pub use aggregate::{Aggregator, SourceMapAggregator, SourceValues};
pub use artifact::{ArtifactWriter, TYPE_DECLARATIONS};
pub use backfill::{IdGenerator, IdentifierBackfiller, UuidGenerator};
pub use config::{OutputFormat, ThemeConfig, CONFIG_FILENAME, DEFAULT_DEBOUNCE_MS};
pub use error::{Result, ThemeError};
pub use pipeline::{PipelineState, PipelineStats, RegenerationPipeline, RunReport};
pub use source::{has_changed, SourceDescriptor, SourceRegistry};

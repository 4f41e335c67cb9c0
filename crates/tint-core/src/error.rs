//! Error types for the regeneration pipeline.
//!
//! Configuration problems are fatal and surface before a pipeline exists.
//! Everything else aborts a single run and leaves the pipeline usable.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for pipeline operations.
pub type Result<T> = std::result::Result<T, ThemeError>;

/// Things that can go wrong while loading or regenerating a theme.
#[derive(Error, Debug)]
pub enum ThemeError {
    /// Missing or invalid configuration, or a source path that doesn't
    /// exist when the pipeline is constructed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A configured source became unreadable after construction.
    #[error("failed to read source '{name}' at '{path}': {source}")]
    SourceRead {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source's content is not valid JSON.
    #[error("failed to parse source '{name}' at '{path}': {source}")]
    Parse {
        name: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The artifact or a back-filled source couldn't be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ThemeError {
    /// Creates a configuration error from any message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a read error with the source name and path for context.
    pub fn read(name: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceRead {
            name: name.into(),
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error with the source name and path for context.
    pub fn parse(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Parse {
            name: name.into(),
            path: path.into(),
            source,
        }
    }

    /// Creates a write error with the target path for context.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Whether this error prevents the pipeline from ever starting.
    ///
    /// Run-time failures are not fatal: the next file change retries.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

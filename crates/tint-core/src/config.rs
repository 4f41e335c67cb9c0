//! Theme configuration.
//!
//! A config names every theme source by a logical key and says where the
//! compiled artifact goes. It is immutable once loaded; the pipeline only
//! reads it.

use crate::error::{Result, ThemeError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default name of the config file looked up by the CLI.
pub const CONFIG_FILENAME: &str = "tint.config.json";

/// Quiescence delay used when the config doesn't set one.
pub const DEFAULT_DEBOUNCE_MS: u64 = 10;

/// How the compiled artifact is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `export default <theme>`
    #[default]
    Plain,
    /// A named constant plus the styled-components type augmentation.
    Typed,
}

impl OutputFormat {
    /// Picks a format from the output file extension. `.ts` means typed.
    pub fn infer(output: &Path) -> Self {
        match output.extension().and_then(|e| e.to_str()) {
            Some("ts") => Self::Typed,
            _ => Self::Plain,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Plain => "plain",
            Self::Typed => "typed",
        };
        write!(f, "{}", s)
    }
}

/// On-disk shape of `tint.config.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    sources: BTreeMap<String, PathBuf>,
    output: PathBuf,
    #[serde(default)]
    format: Option<OutputFormat>,
    #[serde(default)]
    backfill_ids: Option<bool>,
    #[serde(default)]
    id_field: Option<String>,
    #[serde(default)]
    debounce_ms: Option<u64>,
}

/// Validated theme configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeConfig {
    /// Logical source name -> source file path.
    pub sources: BTreeMap<String, PathBuf>,

    /// Where the compiled theme is written.
    pub output: PathBuf,

    /// Wrapper applied around the serialized theme.
    pub format: OutputFormat,

    /// Assign identifiers to records that lack one and write them back.
    pub backfill_ids: bool,

    /// Name of the record identifier field.
    pub id_field: String,

    /// Quiescence delay before a debounced run fires.
    pub debounce: Duration,
}

impl ThemeConfig {
    /// Creates a config with defaults for everything but sources and output.
    ///
    /// The output format is inferred from the output extension.
    pub fn new<N, P>(sources: impl IntoIterator<Item = (N, P)>, output: impl Into<PathBuf>) -> Self
    where
        N: Into<String>,
        P: Into<PathBuf>,
    {
        let output = output.into();
        Self {
            sources: sources
                .into_iter()
                .map(|(name, path)| (name.into(), path.into()))
                .collect(),
            format: OutputFormat::infer(&output),
            output,
            backfill_ids: true,
            id_field: "id".to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_backfill(mut self, enabled: bool) -> Self {
        self.backfill_ids = enabled;
        self
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Loads and validates a config file.
    ///
    /// Relative source and output paths are resolved against `root`.
    /// Source existence is checked later, when the registry is built.
    pub fn load(path: &Path, root: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ThemeError::config(format!(
                "no {} config file was found at '{}'",
                CONFIG_FILENAME,
                path.display()
            )));
        }

        let data = fs::read_to_string(path).map_err(|e| {
            ThemeError::config(format!("failed to read '{}': {}", path.display(), e))
        })?;

        Self::from_json(&data, root).map_err(|e| match e {
            ThemeError::Configuration(msg) => ThemeError::config(format!(
                "config file '{}' is invalid: {}",
                path.display(),
                msg
            )),
            other => other,
        })
    }

    /// Parses and validates config JSON, resolving paths against `root`.
    pub fn from_json(data: &str, root: &Path) -> Result<Self> {
        let raw: RawConfig =
            serde_json::from_str(data).map_err(|e| ThemeError::config(e.to_string()))?;

        if raw.sources.is_empty() {
            return Err(ThemeError::config("\"sources\" must name at least one file"));
        }
        if raw.sources.keys().any(|name| name.trim().is_empty()) {
            return Err(ThemeError::config("source names must not be empty"));
        }
        if raw.output.as_os_str().is_empty() {
            return Err(ThemeError::config("\"output\" must not be empty"));
        }

        let debounce_ms = raw.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS);
        if debounce_ms == 0 {
            return Err(ThemeError::config("\"debounceMs\" must be greater than zero"));
        }

        let id_field = raw.id_field.unwrap_or_else(|| "id".to_string());
        if id_field.is_empty() {
            return Err(ThemeError::config("\"idField\" must not be empty"));
        }

        let output = root.join(raw.output);
        let format = raw.format.unwrap_or_else(|| OutputFormat::infer(&output));

        Ok(Self {
            sources: raw
                .sources
                .into_iter()
                .map(|(name, path)| (name, root.join(path)))
                .collect(),
            output,
            format,
            backfill_ids: raw.backfill_ids.unwrap_or(true),
            id_field,
            debounce: Duration::from_millis(debounce_ms),
        })
    }
}

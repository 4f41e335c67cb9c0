//! Compiled theme output.
//!
//! The artifact is a JS/TS module exporting the aggregated theme. It is
//! rewritten in full on every successful regeneration, through a temp file
//! in the same directory so an interrupted write never leaves a truncated
//! module behind.

use crate::config::OutputFormat;
use crate::error::{Result, ThemeError};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Static block emitted between the theme constant and the default export
/// in typed output.
pub const TYPE_DECLARATIONS: &str = "
type StyleTheme = typeof theme

declare module 'styled-components' {
\texport interface DefaultTheme extends StyleTheme {}
}

";

/// Serializes the theme and writes it to the configured output path.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output: PathBuf,
    format: OutputFormat,
}

impl ArtifactWriter {
    pub fn new(output: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output: output.into(),
            format,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Renders the module text for `theme` without touching disk.
    pub fn render(&self, theme: &Value) -> Result<String> {
        let json = to_tab_indented(theme).map_err(|e| ThemeError::write(&self.output, e))?;

        Ok(match self.format {
            OutputFormat::Plain => format!("export default {}", json),
            OutputFormat::Typed => format!(
                "const theme = {} as const\n\n{}export default theme",
                json, TYPE_DECLARATIONS
            ),
        })
    }

    /// Renders `theme` and replaces the output file with it.
    pub fn write(&self, theme: &Value) -> Result<()> {
        let text = self.render(theme)?;
        self.persist(text.as_bytes())
            .map_err(|e| ThemeError::write(&self.output, e))?;

        info!(
            "Wrote {} theme to {} ({} bytes)",
            self.format,
            self.output.display(),
            text.len()
        );
        Ok(())
    }

    fn persist(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;

        // Temp files are created owner-only; keep the old file's mode, or
        // fall back to a normal readable file.
        match fs::metadata(&self.output) {
            Ok(existing) => fs::set_permissions(temp.path(), existing.permissions())?,
            Err(_) => set_default_permissions(temp.path())?,
        }

        debug!(
            "Renaming {} to {}",
            temp.path().display(),
            self.output.display()
        );
        temp.persist(&self.output).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_default_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn to_tab_indented(value: &Value) -> io::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer).map_err(io::Error::other)?;
    String::from_utf8(buf).map_err(io::Error::other)
}

//! CLI command implementations.

use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tint_core::{
    IdentifierBackfiller, RegenerationPipeline, RunReport, SourceMapAggregator, ThemeConfig,
    CONFIG_FILENAME,
};
use tint_watcher::{FsChangeSource, ThemePlugin};
use tracing::debug;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Loads the config, resolving relative paths against `root`.
fn load_config(config: Option<&Path>, root: &Path) -> Result<ThemeConfig> {
    let path = match config {
        Some(path) => root.join(path),
        None => root.join(CONFIG_FILENAME),
    };
    debug!("Loading config from {}", path.display());
    Ok(ThemeConfig::load(&path, root)?)
}

fn current_dir() -> Result<PathBuf> {
    Ok(std::env::current_dir()?)
}

/// Write a starter config in a directory.
pub fn init(path: &Path) -> Result<()> {
    let config_path = path.join(CONFIG_FILENAME);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    fs::create_dir_all(path)?;

    let default_config = serde_json::json!({
        "sources": {
            "values": "theme/values.json",
            "variants": "theme/variants.json"
        },
        "output": "src/theme.ts"
    });

    fs::write(&config_path, serde_json::to_string_pretty(&default_config)?)?;

    println!("{} Created {}", "✓".green(), config_path.display());
    println!("  Run {} to compile your theme", "tint build".cyan());

    Ok(())
}

/// Regenerate the theme once.
pub fn build(config: Option<&Path>) -> Result<()> {
    build_in(&current_dir()?, config)
}

fn build_in(root: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config, root)?;
    let mut pipeline = RegenerationPipeline::new(config, SourceMapAggregator)?;

    let report = pipeline.run()?;
    print_report(&report, pipeline.writer().output());

    // Nothing watches the write-back here, so pick it up directly
    if !report.backfilled.is_empty() {
        let report = pipeline.run()?;
        print_report(&report, pipeline.writer().output());
    }

    Ok(())
}

/// Regenerate the theme, then keep watching until Ctrl+C.
pub async fn watch(config: Option<&Path>, debounce: Option<Duration>) -> Result<()> {
    let root = current_dir()?;
    let mut config = load_config(config, &root)?;
    if let Some(debounce) = debounce {
        config = config.with_debounce(debounce);
    }

    let pipeline = RegenerationPipeline::new(config, SourceMapAggregator)?;
    let output = pipeline.writer().output().to_path_buf();
    let mut plugin = ThemePlugin::new(pipeline, FsChangeSource::new());

    if let Some(report) = plugin.apply()? {
        print_report(&report, &output);
    } else {
        eprintln!(
            "{} Initial build failed, waiting for changes",
            "⚠".yellow()
        );
    }

    println!("  Press {} to stop", "Ctrl+C".cyan());

    let shutdown = plugin.shutdown_handle();
    let worker = tokio::task::spawn_blocking(move || plugin.run_until_shutdown());

    tokio::signal::ctrl_c().await?;
    shutdown.shutdown();

    let summary = worker.await??;
    println!(
        "{} Stopped after {} run(s) ({} failed)",
        "✓".green(),
        summary.runs,
        summary.failed_runs
    );

    Ok(())
}

/// Show configured sources and how many records still need identifiers.
pub fn status(config: Option<&Path>) -> Result<()> {
    status_in(&current_dir()?, config)
}

fn status_in(root: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config, root)?;
    let backfiller = IdentifierBackfiller::new(config.id_field.clone());

    println!("{}", "Tint Status".cyan().bold());
    println!();
    println!("  {} {}", "Output:".dimmed(), config.output.display());
    println!("  {} {}", "Format:".dimmed(), config.format);
    println!(
        "  {} {}",
        "Backfill:".dimmed(),
        if config.backfill_ids {
            format!("on ('{}')", config.id_field)
        } else {
            "off".to_string()
        }
    );
    println!("  {} {:?}", "Debounce:".dimmed(), config.debounce);
    println!();

    for (name, path) in &config.sources {
        let line = match describe_source(path, &backfiller) {
            Ok(description) => description,
            Err(e) => format!("{}", e.to_string().red()),
        };
        println!("  {} {} {}", name.cyan(), path.display().to_string().dimmed(), line);
    }

    Ok(())
}

fn describe_source(path: &Path, backfiller: &IdentifierBackfiller) -> Result<String> {
    let raw = fs::read(path)?;
    let value: serde_json::Value = serde_json::from_slice(&raw)?;
    let missing = backfiller.count_missing(&value);

    let ids = if missing > 0 {
        format!("{} missing id(s)", missing).yellow().to_string()
    } else {
        "ok".green().to_string()
    };
    Ok(format!("({} bytes) {}", raw.len(), ids))
}

fn print_report(report: &RunReport, output: &Path) {
    if report.is_noop() {
        println!("{} Theme is up to date", "✓".green());
        return;
    }

    for (name, count) in &report.backfilled {
        println!(
            "{} Assigned {} identifier(s) in {}",
            "✓".green(),
            count.to_string().cyan(),
            name
        );
    }

    println!(
        "{} Compiled [{}] into {}",
        "✓".green(),
        report.changed.join(", "),
        output.display()
    );
}

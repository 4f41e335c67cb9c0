//! The regeneration pipeline.
//!
//! One run reads every source, keeps the ones whose bytes changed, parses
//! them, back-fills missing identifiers, commits the new snapshots and, if
//! anything changed, aggregates and writes the artifact.
//!
//! A run either commits every changed source or none of them. A read or
//! parse failure anywhere aborts the whole run and leaves the registry at
//! its last good state, so the next edit is still seen as a change.

use crate::aggregate::Aggregator;
use crate::artifact::ArtifactWriter;
use crate::backfill::IdentifierBackfiller;
use crate::config::ThemeConfig;
use crate::error::{Result, ThemeError};
use crate::source::{has_changed, SourceRegistry};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Where the pipeline is in its run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Running,
}

/// Counters accumulated over the life of a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub runs: u64,
    pub noop_runs: u64,
    pub failed_runs: u64,
    pub artifacts_written: u64,
    pub ids_assigned: u64,
}

/// What a single successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Sources whose bytes changed, in name order.
    pub changed: Vec<String>,

    /// Sources that had identifiers written back, with the count assigned.
    pub backfilled: Vec<(String, usize)>,

    /// Whether the artifact was regenerated.
    pub artifact_written: bool,
}

impl RunReport {
    /// True when nothing changed and nothing was written.
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty() && !self.artifact_written
    }
}

/// A source that changed during the current run, not yet committed.
struct ChangedSource {
    name: String,
    path: PathBuf,
    raw: Vec<u8>,
    value: Value,
}

/// Regenerates the compiled theme from its sources.
///
/// All mutable state lives in the pipeline itself, so independent
/// pipelines never interfere with each other.
pub struct RegenerationPipeline {
    config: ThemeConfig,
    registry: SourceRegistry,
    backfiller: Option<IdentifierBackfiller>,
    aggregator: Box<dyn Aggregator>,
    writer: ArtifactWriter,
    state: PipelineState,
    stats: PipelineStats,
}

impl std::fmt::Debug for RegenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegenerationPipeline")
            .field("registry", &self.registry)
            .field("backfiller", &self.backfiller)
            .field("writer", &self.writer)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl RegenerationPipeline {
    /// Builds a pipeline, registering every configured source.
    ///
    /// Fails with a configuration error if any source path is missing.
    pub fn new(config: ThemeConfig, aggregator: impl Aggregator + 'static) -> Result<Self> {
        if config.sources.is_empty() {
            return Err(ThemeError::config("no theme sources configured"));
        }

        let mut registry = SourceRegistry::new();
        for (name, path) in &config.sources {
            registry.register(name.clone(), path)?;
        }

        let backfiller = config
            .backfill_ids
            .then(|| IdentifierBackfiller::new(config.id_field.clone()));
        let writer = ArtifactWriter::new(config.output.clone(), config.format);

        Ok(Self {
            config,
            registry,
            backfiller,
            aggregator: Box::new(aggregator),
            writer,
            state: PipelineState::Idle,
            stats: PipelineStats::default(),
        })
    }

    /// Replaces the backfiller, e.g. to inject a deterministic generator.
    ///
    /// Has no effect when back-filling is disabled in the config.
    pub fn with_backfiller(mut self, backfiller: IdentifierBackfiller) -> Self {
        if self.config.backfill_ids {
            self.backfiller = Some(backfiller);
        }
        self
    }

    pub fn config(&self) -> &ThemeConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn backfiller(&self) -> Option<&IdentifierBackfiller> {
        self.backfiller.as_ref()
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Runs one regeneration pass to completion.
    ///
    /// Errors abort only this run; the pipeline stays usable.
    pub fn run(&mut self) -> Result<RunReport> {
        let start = Instant::now();
        self.state = PipelineState::Running;
        self.stats.runs += 1;

        let result = self.run_pass();

        self.state = PipelineState::Idle;
        match &result {
            Ok(report) => {
                if report.is_noop() {
                    self.stats.noop_runs += 1;
                    debug!("No theme sources changed");
                } else {
                    info!(
                        "Regenerated theme from [{}] in {:?}",
                        report.changed.join(", "),
                        start.elapsed()
                    );
                }
            }
            Err(_) => self.stats.failed_runs += 1,
        }

        result
    }

    fn run_pass(&mut self) -> Result<RunReport> {
        // Read everything before deciding anything
        let mut reads = Vec::with_capacity(self.registry.len());
        for descriptor in self.registry.iter() {
            let raw = fs::read(&descriptor.path)
                .map_err(|e| ThemeError::read(&descriptor.name, &descriptor.path, e))?;
            reads.push((descriptor.name.clone(), descriptor.path.clone(), raw));
        }

        let mut changed = Vec::new();
        for (name, path, raw) in reads {
            let previous = self
                .registry
                .get(&name)
                .map(|d| d.last_raw.as_slice())
                .unwrap_or_default();

            if !has_changed(previous, &raw) {
                debug!("Source '{}' unchanged", name);
                continue;
            }

            debug!("Source '{}' changed ({} bytes)", name, raw.len());
            let value: Value =
                serde_json::from_slice(&raw).map_err(|e| ThemeError::parse(&name, &path, e))?;
            changed.push(ChangedSource {
                name,
                path,
                raw,
                value,
            });
        }

        let mut report = RunReport::default();

        // Write-backs change the bytes on disk again; the watcher brings
        // us back here and the second pass finds nothing to assign.
        if let Some(backfiller) = &self.backfiller {
            for source in &changed {
                let assigned = backfiller.backfill_file(&source.name, &source.path, &source.value)?;
                if assigned > 0 {
                    self.stats.ids_assigned += assigned as u64;
                    report.backfilled.push((source.name.clone(), assigned));
                }
            }
        }

        for source in changed {
            self.registry.update(&source.name, source.raw, source.value);
            report.changed.push(source.name);
        }

        if report.changed.is_empty() {
            return Ok(report);
        }

        let theme = self.aggregator.aggregate(&self.registry.values());
        self.writer.write(&theme)?;
        self.stats.artifacts_written += 1;
        report.artifact_written = true;

        Ok(report)
    }
}

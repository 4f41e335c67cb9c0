//! Host integration.
//!
//! A host build tool calls [`ThemePlugin::apply`] once when it initializes
//! the plugin. That produces the first artifact eagerly and subscribes to
//! every source. [`ThemePlugin::run_until_shutdown`] then feeds change
//! notifications through the debouncer into the pipeline, one run at a
//! time, until a [`ShutdownHandle`] stops it.

use crate::debouncer::Debouncer;
use crate::error::WatchError;
use crate::watcher::{ChangeSource, WatchEvent};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tint_core::{RegenerationPipeline, RunReport};
use tracing::{debug, error, info};

/// Counters for one watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Change notifications for known sources.
    pub notifications: u64,
    /// Notifications for paths no source is registered under.
    pub ignored: u64,
    /// Pipeline runs, including the eager one from `apply`.
    pub runs: u64,
    /// Runs that returned an error.
    pub failed_runs: u64,
}

/// Stops a running watch loop from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    events: Sender<WatchEvent>,
}

impl ShutdownHandle {
    /// Asks the loop to stop. Returns false if the loop is already gone.
    pub fn shutdown(&self) -> bool {
        self.events.send(WatchEvent::Shutdown).is_ok()
    }
}

/// Drives a [`RegenerationPipeline`] from change notifications.
pub struct ThemePlugin<S> {
    pipeline: RegenerationPipeline,
    source: S,
    debouncer: Debouncer,
    events_tx: Sender<WatchEvent>,
    events_rx: Receiver<WatchEvent>,
    subscribed: Vec<PathBuf>,
    applied: bool,
    summary: WatchSummary,
}

impl<S: ChangeSource> ThemePlugin<S> {
    /// Wraps a pipeline, debouncing with the delay from its config.
    pub fn new(pipeline: RegenerationPipeline, source: S) -> Self {
        let debouncer = Debouncer::new(pipeline.config().debounce);
        let (events_tx, events_rx) = channel();

        Self {
            pipeline,
            source,
            debouncer,
            events_tx,
            events_rx,
            subscribed: Vec::new(),
            applied: false,
            summary: WatchSummary::default(),
        }
    }

    /// Overrides the quiescence delay.
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debouncer = Debouncer::new(delay);
        self
    }

    pub fn pipeline(&self) -> &RegenerationPipeline {
        &self.pipeline
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    pub fn summary(&self) -> WatchSummary {
        self.summary
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            events: self.events_tx.clone(),
        }
    }

    /// Initialization hook: regenerate once, then watch every source.
    ///
    /// A failing first run is logged and counted but does not stop the
    /// watchers from being installed; the next edit retries. If the first
    /// run wrote identifiers back, that write happened before anything was
    /// watching, so the follow-up pass is scheduled here. Returns the first
    /// run's report when it succeeded.
    ///
    /// The plugin only counts as applied once every source is subscribed.
    pub fn apply(&mut self) -> Result<Option<RunReport>, WatchError> {
        if self.applied {
            return Err(WatchError::AlreadyApplied);
        }

        let initial = self.execute_run();

        let paths: Vec<PathBuf> = self
            .pipeline
            .registry()
            .paths()
            .map(Path::to_path_buf)
            .collect();
        for path in &paths {
            if !self.subscribed.contains(path) {
                self.source.subscribe(path, self.events_tx.clone())?;
                self.subscribed.push(path.clone());
            }
        }
        self.applied = true;

        if initial.as_ref().is_some_and(|r| !r.backfilled.is_empty()) {
            debug!("Scheduling follow-up run for identifier write-back");
            self.debouncer.notify();
        }

        info!(
            "Watching {} theme source(s), debounce {:?}",
            paths.len(),
            self.debouncer.delay()
        );
        Ok(initial)
    }

    /// Processes notifications until shutdown is requested.
    pub fn run_until_shutdown(&mut self) -> Result<WatchSummary, WatchError> {
        if !self.applied {
            return Err(WatchError::NotApplied);
        }

        loop {
            let event = match self.debouncer.time_until_due() {
                None => match self.events_rx.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                },
                Some(wait) => match self.events_rx.recv_timeout(wait) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
            };

            match event {
                Some(WatchEvent::Changed(path)) => self.record_change(&path),
                Some(WatchEvent::Shutdown) => {
                    if let Some(pending) = self.debouncer.cancel() {
                        debug!(
                            "Dropping pending run for {} notification(s)",
                            pending.coalesced
                        );
                    }
                    break;
                }
                None => {}
            }

            if let Some(pending) = self.debouncer.take_due() {
                debug!(
                    "Regenerating after {} coalesced notification(s)",
                    pending.coalesced
                );
                self.execute_run();
            }
        }

        info!(
            "Stopped watching: {} run(s), {} failed",
            self.summary.runs, self.summary.failed_runs
        );
        Ok(self.summary)
    }

    fn record_change(&mut self, path: &Path) {
        match self.pipeline.registry().find_by_path(path) {
            Some(source) => {
                debug!("Change notification for '{}'", source.name);
                self.summary.notifications += 1;
                self.debouncer.notify();
            }
            None => {
                debug!("Ignoring change to unregistered path {}", path.display());
                self.summary.ignored += 1;
            }
        }
    }

    fn execute_run(&mut self) -> Option<RunReport> {
        self.summary.runs += 1;
        match self.pipeline.run() {
            Ok(report) => Some(report),
            Err(e) => {
                self.summary.failed_runs += 1;
                error!("Theme regeneration failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::{ChannelChangeSource, FsChangeSource};
    use serde_json::Value;
    use std::fs;
    use std::thread;
    use tempfile::{tempdir, TempDir};
    use tint_core::{SourceMapAggregator, ThemeConfig};

    const DEBOUNCE: Duration = Duration::from_millis(40);
    const SETTLE: Duration = Duration::from_millis(300);

    fn setup(values: &str) -> (TempDir, ThemePlugin<ChannelChangeSource>, ChannelChangeSource) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("values.json"), values).unwrap();
        fs::write(dir.path().join("variants.json"), r#"[{"id":"v1"}]"#).unwrap();

        let config = ThemeConfig::new(
            [
                ("values", dir.path().join("values.json")),
                ("variants", dir.path().join("variants.json")),
            ],
            dir.path().join("theme.js"),
        )
        .with_debounce(DEBOUNCE);

        let pipeline = RegenerationPipeline::new(config, SourceMapAggregator).unwrap();
        let source = ChannelChangeSource::new();
        let trigger = source.clone();
        (dir, ThemePlugin::new(pipeline, source), trigger)
    }

    fn values_path(dir: &TempDir) -> PathBuf {
        dir.path().join("values.json").canonicalize().unwrap()
    }

    /// Runs the loop on a thread, calls `drive`, waits, then shuts down.
    fn watch_while(
        mut plugin: ThemePlugin<ChannelChangeSource>,
        drive: impl FnOnce(),
    ) -> (ThemePlugin<ChannelChangeSource>, WatchSummary) {
        let shutdown = plugin.shutdown_handle();
        let handle = thread::spawn(move || {
            let summary = plugin.run_until_shutdown().unwrap();
            (plugin, summary)
        });

        drive();
        thread::sleep(SETTLE);
        assert!(shutdown.shutdown());
        handle.join().unwrap()
    }

    #[test]
    fn test_apply_runs_eagerly_and_subscribes() {
        let (dir, mut plugin, trigger) = setup(r#"[{"id":"a1"}]"#);

        let report = plugin.apply().unwrap().unwrap();
        assert!(report.artifact_written);
        assert!(dir.path().join("theme.js").exists());
        assert_eq!(trigger.subscribed_paths().len(), 2);
        assert!(plugin.is_applied());
    }

    #[test]
    fn test_apply_only_once() {
        let (_dir, mut plugin, _trigger) = setup("[]");
        plugin.apply().unwrap();
        assert!(matches!(plugin.apply(), Err(WatchError::AlreadyApplied)));
    }

    #[test]
    fn test_loop_requires_apply() {
        let (_dir, mut plugin, _trigger) = setup("[]");
        assert!(matches!(
            plugin.run_until_shutdown(),
            Err(WatchError::NotApplied)
        ));
    }

    #[test]
    fn test_burst_of_notifications_runs_once() {
        let (dir, mut plugin, trigger) = setup(r#"[{"id":"a1"}]"#);
        plugin.apply().unwrap();
        let path = values_path(&dir);

        let (plugin, summary) = watch_while(plugin, || {
            fs::write(&path, r#"[{"id":"a2"}]"#).unwrap();
            for _ in 0..5 {
                trigger.touch(&path);
            }
        });

        assert_eq!(summary.notifications, 5);
        assert_eq!(summary.runs, 2);
        assert_eq!(plugin.pipeline().stats().artifacts_written, 2);
        assert!(fs::read_to_string(dir.path().join("theme.js"))
            .unwrap()
            .contains("a2"));
    }

    #[test]
    fn test_apply_schedules_follow_up_after_write_back() {
        let (_dir, mut plugin, _trigger) = setup(r#"[{"a":1}]"#);
        plugin.apply().unwrap();
        assert!(plugin.debouncer().is_pending());

        let (_dir, mut plugin, _trigger) = setup(r#"[{"id":"a1"}]"#);
        plugin.apply().unwrap();
        assert!(!plugin.debouncer().is_pending());
    }

    #[test]
    fn test_backfill_write_back_settles() {
        let (dir, mut plugin, trigger) = setup(r#"[{"a":1}]"#);
        let first = plugin.apply().unwrap().unwrap();
        assert_eq!(first.backfilled, vec![("values".to_string(), 1)]);

        let path = values_path(&dir);
        let backfilled = fs::read(&path).unwrap();
        let values: Value = serde_json::from_slice(&backfilled).unwrap();
        let id = values[0]["id"].as_str().unwrap().to_string();
        assert_eq!(id.len(), 36);

        // No notification for the write-back itself; a stray touch later on
        let (plugin, summary) = watch_while(plugin, || {
            thread::sleep(SETTLE);
            trigger.touch(&path);
        });

        assert_eq!(summary.runs, 3);
        assert_eq!(summary.failed_runs, 0);
        assert_eq!(fs::read(&path).unwrap(), backfilled);

        let stats = plugin.pipeline().stats();
        assert_eq!(stats.artifacts_written, 2);
        assert_eq!(stats.noop_runs, 1);
        assert_eq!(stats.ids_assigned, 1);

        assert_eq!(
            plugin.pipeline().registry().get("values").unwrap().last_raw,
            backfilled
        );
        assert!(fs::read_to_string(dir.path().join("theme.js"))
            .unwrap()
            .contains(&id));
    }

    #[test]
    fn test_fs_source_completes_write_back_cycle() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("values.json"), r#"[{"a":1}]"#).unwrap();
        let config = ThemeConfig::new(
            [("values", dir.path().join("values.json"))],
            dir.path().join("theme.js"),
        )
        .with_debounce(DEBOUNCE);
        let pipeline = RegenerationPipeline::new(config, SourceMapAggregator).unwrap();
        let mut plugin = ThemePlugin::new(pipeline, FsChangeSource::new());
        plugin.apply().unwrap();

        let shutdown = plugin.shutdown_handle();
        let handle = thread::spawn(move || {
            let summary = plugin.run_until_shutdown().unwrap();
            (plugin, summary)
        });
        thread::sleep(SETTLE * 3);
        shutdown.shutdown();
        let (_plugin, summary) = handle.join().unwrap();

        assert!(summary.runs >= 2);
        let values: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("values.json")).unwrap())
                .unwrap();
        let id = values[0]["id"].as_str().unwrap();
        assert!(fs::read_to_string(dir.path().join("theme.js"))
            .unwrap()
            .contains(id));
    }

    /// Fails every subscription after the first `allowed`.
    struct FailingSource {
        inner: ChannelChangeSource,
        allowed: usize,
    }

    impl ChangeSource for FailingSource {
        fn subscribe(&mut self, path: &Path, events: Sender<WatchEvent>) -> Result<(), WatchError> {
            if self.inner.subscribed_paths().len() >= self.allowed {
                return Err(WatchError::UnwatchablePath(path.to_path_buf()));
            }
            self.inner.subscribe(path, events)
        }
    }

    #[test]
    fn test_failed_subscription_leaves_plugin_unapplied() {
        let (dir, plugin, _trigger) = setup(r#"[{"id":"a1"}]"#);
        drop(plugin);

        let config = ThemeConfig::new(
            [
                ("values", dir.path().join("values.json")),
                ("variants", dir.path().join("variants.json")),
            ],
            dir.path().join("theme.js"),
        );
        let pipeline = RegenerationPipeline::new(config, SourceMapAggregator).unwrap();
        let inner = ChannelChangeSource::new();
        let mut plugin = ThemePlugin::new(
            pipeline,
            FailingSource {
                inner: inner.clone(),
                allowed: 1,
            },
        );

        assert!(matches!(
            plugin.apply(),
            Err(WatchError::UnwatchablePath(_))
        ));
        assert!(!plugin.is_applied());
        assert!(matches!(
            plugin.run_until_shutdown(),
            Err(WatchError::NotApplied)
        ));

        plugin.source.allowed = 2;
        plugin.apply().unwrap();
        assert!(plugin.is_applied());
        assert_eq!(inner.subscribed_paths().len(), 2);
    }

    #[test]
    fn test_shutdown_drops_pending_run() {
        let (dir, mut plugin, trigger) = setup(r#"[{"id":"a1"}]"#);
        plugin.apply().unwrap();
        let path = values_path(&dir);

        fs::write(&path, r#"[{"id":"a2"}]"#).unwrap();
        trigger.touch(&path);
        plugin.shutdown_handle().shutdown();

        let summary = plugin.run_until_shutdown().unwrap();
        assert_eq!(summary.notifications, 1);
        assert_eq!(summary.runs, 1);
        assert!(!plugin.debouncer().is_pending());
    }

    #[test]
    fn test_unknown_paths_are_ignored() {
        let (dir, mut plugin, _trigger) = setup(r#"[{"id":"a1"}]"#);
        plugin.apply().unwrap();

        let tx = plugin.events_tx.clone();
        tx.send(WatchEvent::Changed(dir.path().join("elsewhere.json")))
            .unwrap();
        tx.send(WatchEvent::Shutdown).unwrap();

        let summary = plugin.run_until_shutdown().unwrap();
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.notifications, 0);
        assert_eq!(summary.runs, 1);
    }

    #[test]
    fn test_failed_first_run_still_watches_and_recovers() {
        let (dir, mut plugin, trigger) = setup(r#"[{"id":"a1""#);

        assert!(plugin.apply().unwrap().is_none());
        assert_eq!(plugin.summary().failed_runs, 1);
        assert_eq!(trigger.subscribed_paths().len(), 2);
        assert!(!dir.path().join("theme.js").exists());

        let path = values_path(&dir);
        let (_plugin, summary) = watch_while(plugin, || {
            fs::write(&path, r#"[{"id":"a1"}]"#).unwrap();
            trigger.touch(&path);
        });

        assert_eq!(summary.runs, 2);
        assert_eq!(summary.failed_runs, 1);
        assert!(dir.path().join("theme.js").exists());
    }
}

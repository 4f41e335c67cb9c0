//! Change notification sources.
//!
//! The pipeline only needs "tell me when path P changes". [`FsChangeSource`]
//! answers that with the notify crate; [`ChannelChangeSource`] lets a host
//! that already watches files (or a test) push notifications by hand.

use crate::error::WatchError;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Message delivered to the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A subscribed source was touched.
    Changed(PathBuf),
    /// Stop the loop, dropping any pending run.
    Shutdown,
}

/// Something that can report changes to a file.
pub trait ChangeSource {
    /// Starts sending [`WatchEvent::Changed`] to `events` whenever `path`
    /// changes. Subscriptions live as long as the source.
    fn subscribe(&mut self, path: &Path, events: Sender<WatchEvent>) -> Result<(), WatchError>;
}

/// Watches files through the platform's native watcher.
///
/// Each file is watched through its parent directory so editors that save
/// by writing a new file and renaming it over the old one are still seen.
#[derive(Default)]
pub struct FsChangeSource {
    watchers: Vec<notify::RecommendedWatcher>,
}

impl FsChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

impl std::fmt::Debug for FsChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsChangeSource")
            .field("subscriptions", &self.watchers.len())
            .finish()
    }
}

impl ChangeSource for FsChangeSource {
    fn subscribe(&mut self, path: &Path, events: Sender<WatchEvent>) -> Result<(), WatchError> {
        let target = path.to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => return Err(WatchError::UnwatchablePath(target)),
        };

        let watched = target.clone();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    if event.paths.iter().any(|p| p == &watched) {
                        debug!("File changed: {}", watched.display());
                        if events.send(WatchEvent::Changed(watched.clone())).is_err() {
                            debug!("Watch loop gone, dropping change event");
                        }
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching {} for changes", target.display());

        self.watchers.push(watcher);
        Ok(())
    }
}

/// In-process change source fed by [`ChannelChangeSource::touch`].
///
/// Clones share subscriptions, so one clone can be handed to the plugin
/// while another triggers notifications.
#[derive(Debug, Clone, Default)]
pub struct ChannelChangeSource {
    subscriptions: Arc<Mutex<Vec<(PathBuf, Sender<WatchEvent>)>>>,
}

impl ChannelChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is a single push, so a poisoned list is still whole.
    fn lock(&self) -> MutexGuard<'_, Vec<(PathBuf, Sender<WatchEvent>)>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Paths subscribed so far, in subscription order.
    pub fn subscribed_paths(&self) -> Vec<PathBuf> {
        self.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    /// Reports a change to `path`. Returns how many subscribers were told.
    pub fn touch(&self, path: &Path) -> usize {
        let subs = self.lock();
        let mut delivered = 0;
        for (p, tx) in subs.iter().filter(|(p, _)| p == path) {
            if tx.send(WatchEvent::Changed(p.clone())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

impl ChangeSource for ChannelChangeSource {
    fn subscribe(&mut self, path: &Path, events: Sender<WatchEvent>) -> Result<(), WatchError> {
        self.lock().push((path.to_path_buf(), events));
        debug!("Subscribed {} to channel source", path.display());
        Ok(())
    }
}

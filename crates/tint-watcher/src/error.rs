//! Errors raised while installing or driving watchers.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    /// The platform watcher couldn't be created or attached.
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// `apply` is a one-shot initialization hook.
    #[error("plugin has already been applied")]
    AlreadyApplied,

    /// The watch loop was started before `apply`.
    #[error("plugin has not been applied yet")]
    NotApplied,

    /// A subscription was requested for a path with no parent directory.
    #[error("cannot watch '{0}'")]
    UnwatchablePath(PathBuf),
}

//! Tint Watcher - file watching and debounced regeneration
//!
//! This crate connects a [`tint_core::RegenerationPipeline`] to the file system:
//! - Subscribing to change notifications for every theme source
//! - Coalescing bursts of notifications into a single run
//! - Driving the pipeline from the host's watch loop
//!
//! Notifications come from a [`ChangeSource`], so tests can inject them
//! without real file system watchers.

mod debouncer;
mod error;
mod plugin;
mod watcher;

pub use debouncer::{Debouncer, PendingRun};
pub use error::WatchError;
pub use plugin::{ShutdownHandle, ThemePlugin, WatchSummary};
pub use watcher::{ChangeSource, ChannelChangeSource, FsChangeSource, WatchEvent};

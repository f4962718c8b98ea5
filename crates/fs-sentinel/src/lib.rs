//! Directory change notification with normalized events and bounded
//! delivery.
//!
//! A [`FileWatcher`] expands a set of root directories into their full
//! trees, registers every directory with the platform notification backend
//! and runs a single background task that normalizes raw backend events
//! into [`FileSystemEvent`]s. Consumers pull those from an [`EventStream`];
//! when they fall behind, incoming events are dropped rather than queued
//! without bound, and the drops are counted in [`WatcherMetrics`].
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use fs_sentinel::{FileWatcher, WatcherConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fs_sentinel::WatchError> {
//! 	let mut watcher = FileWatcher::new(WatcherConfig::default());
//! 	let events = watcher.events();
//!
//! 	watcher.start(&[PathBuf::from("/some/directory")])?;
//!
//! 	while let Some(event) = events.recv().await {
//! 		println!("{} {}", event.operation, event.path.display());
//! 	}
//!
//! 	Ok(())
//! }
//! ```
#![warn(
	clippy::all,
	clippy::unwrap_used,
	clippy::expect_used,
	unused_qualifications,
	rust_2018_idioms
)]
#![forbid(unsafe_code)]

mod enumerate;
mod error;
mod event;
mod metrics;
mod observer;
mod queue;
mod registry;
mod watcher;

pub use enumerate::collect_watch_dirs;
pub use error::WatchError;
pub use event::{classify, normalize, FileSystemEvent, Operation};
pub use metrics::WatcherMetrics;
pub use observer::{NoopWatchObserver, WatchObserver};
pub use queue::EventStream;
pub use watcher::{FileWatcher, LifecycleState, WatcherConfig, DEFAULT_QUEUE_CAPACITY};

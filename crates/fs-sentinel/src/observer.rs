use std::fmt;

use crate::event::FileSystemEvent;

/// Observer hook for surfacing watcher diagnostics.
///
/// Both callbacks run on the watch loop task and must not block.
pub trait WatchObserver: Send + Sync {
	/// A backend error was reported while watching; the watcher keeps
	/// running
	fn on_runtime_error(&self, error: &notify::Error);

	/// The delivery queue was full and `event` was discarded
	fn on_overflow(&self, event: &FileSystemEvent);
}

/// No-op observer used when no diagnostics sink is wired up.
pub struct NoopWatchObserver;

impl WatchObserver for NoopWatchObserver {
	fn on_runtime_error(&self, _error: &notify::Error) {}

	fn on_overflow(&self, _event: &FileSystemEvent) {}
}

impl fmt::Debug for NoopWatchObserver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("NoopWatchObserver")
	}
}

use std::path::PathBuf;

use async_channel as chan;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, trace, warn};

use crate::error::WatchError;

/// Owns the backend watcher handle and the directories registered with it.
///
/// The registered set never changes after a successful bind; directories
/// created later are not picked up.
#[derive(Debug)]
pub(crate) struct WatchRegistry {
	watcher: RecommendedWatcher,
	watched: Vec<PathBuf>,
}

impl WatchRegistry {
	/// Create the backend handle and register every directory with it.
	///
	/// Each directory is registered non-recursively, the caller is expected
	/// to have expanded the tree already. If any registration fails, the
	/// ones made so far are rolled back and the error names the offending
	/// path.
	pub(crate) fn bind(
		dirs: Vec<PathBuf>,
		raw_tx: chan::Sender<notify::Result<Event>>,
	) -> Result<Self, WatchError> {
		let mut watcher = RecommendedWatcher::new(
			move |result| {
				if !raw_tx.is_closed() {
					// Not blocking the backend thread as this is an unbounded channel
					if raw_tx.send_blocking(result).is_err() {
						error!("Unable to send backend event to watch loop;");
					}
				} else {
					error!("Tried to send backend events to a closed channel;");
				}
			},
			Config::default(),
		)?;

		let mut watched: Vec<PathBuf> = Vec::with_capacity(dirs.len());
		for dir in dirs {
			if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
				for bound in &watched {
					if let Err(unbind_err) = watcher.unwatch(bound) {
						warn!(
							?unbind_err,
							path = %bound.display(),
							"Failed to deregister directory while rolling back;"
						);
					}
				}

				return Err(WatchError::Register(e, dir));
			}

			trace!(path = %dir.display(), "Now watching directory;");
			watched.push(dir);
		}

		Ok(Self { watcher, watched })
	}

	pub(crate) fn watched_count(&self) -> usize {
		self.watched.len()
	}

	/// Deregister every directory, consuming the registry.
	///
	/// Deregistration failures are logged and skipped, the backend handle is
	/// dropped afterwards either way.
	pub(crate) fn release(mut self) {
		for dir in &self.watched {
			if let Err(e) = self.watcher.unwatch(dir) {
				warn!(?e, path = %dir.display(), "Unable to deregister directory;");
			} else {
				trace!(path = %dir.display(), "Stopped watching directory;");
			}
		}
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
	use super::*;

	use std::{fs, time::Duration};

	use tempfile::tempdir;

	#[test]
	fn bind_registers_every_directory() {
		let root = tempdir().unwrap();
		let inner = root.path().join("inner");
		fs::create_dir(&inner).unwrap();

		let (raw_tx, _raw_rx) = chan::unbounded();
		let registry = WatchRegistry::bind(vec![root.path().to_path_buf(), inner], raw_tx)
			.expect("Failed to bind watch registry");

		assert_eq!(registry.watched_count(), 2);
		registry.release();
	}

	#[test]
	fn bind_rolls_back_when_a_registration_fails() {
		let root = tempdir().unwrap();
		let good = root.path().join("good");
		fs::create_dir(&good).unwrap();
		let missing = root.path().join("missing");

		let (raw_tx, _raw_rx) = chan::unbounded();
		match WatchRegistry::bind(vec![good.clone(), missing.clone()], raw_tx) {
			Err(WatchError::Register(_, path)) => assert_eq!(path, missing),
			other => panic!("expected registration failure, got {other:?}"),
		}

		// The rolled back directory can be bound again right away
		let (raw_tx, _raw_rx) = chan::unbounded();
		let registry =
			WatchRegistry::bind(vec![good], raw_tx).expect("Failed to rebind watch registry");
		registry.release();
	}

	#[test]
	fn rolled_back_directories_emit_no_events() {
		let root = tempdir().unwrap();
		let good = root.path().join("good");
		fs::create_dir(&good).unwrap();
		let missing = root.path().join("missing");

		let (raw_tx, raw_rx) = chan::unbounded();
		assert!(WatchRegistry::bind(vec![good.clone(), missing], raw_tx).is_err());

		// A change in the rolled back directory must not reach the channel
		fs::write(good.join("test.txt"), "test").unwrap();
		std::thread::sleep(Duration::from_millis(400));

		assert!(raw_rx.try_recv().is_err());
	}
}

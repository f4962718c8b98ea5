use std::{
	collections::HashSet,
	fs, io,
	path::{Path, PathBuf},
};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::WatchError;

/// Walk every root and collect the directories to register with the
/// notification backend, the roots themselves included.
///
/// The backend only reports changes for directories it was explicitly
/// given, so the whole tree under each root is expanded upfront. Symlinks
/// are never followed, a symlinked subdirectory is not part of the watch
/// set. Any unreadable entry aborts the whole collection, a partial watch
/// set would silently miss changes.
///
/// The returned list preserves walk order and contains no duplicates, even
/// when roots overlap.
pub fn collect_watch_dirs(roots: &[PathBuf]) -> Result<Vec<PathBuf>, WatchError> {
	let mut dirs = Vec::new();
	let mut seen = HashSet::new();

	for root in roots {
		match fs::metadata(root) {
			Ok(metadata) if metadata.is_dir() => {}
			Ok(_) => {
				return Err(WatchError::Enumerate(
					io::Error::new(io::ErrorKind::NotADirectory, "watch root is not a directory"),
					root.clone(),
				));
			}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				return Err(WatchError::RootNotFound(root.clone()));
			}
			Err(e) => return Err(WatchError::Enumerate(e, root.clone())),
		}

		for entry in WalkDir::new(root).follow_links(false) {
			let entry = match entry {
				Ok(entry) => entry,
				Err(e) => {
					let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
					return Err(WatchError::Enumerate(e.into(), path));
				}
			};

			if entry.file_type().is_dir() && seen.insert(entry.path().to_path_buf()) {
				dirs.push(entry.into_path());
			}
		}

		debug!(root = %root.display(), total = dirs.len(), "Enumerated watch root;");
	}

	Ok(dirs)
}

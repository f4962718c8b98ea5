use std::{io, path::PathBuf};

use thiserror::Error;

use crate::watcher::LifecycleState;

/// Error type for watch setup and lifecycle failures.
///
/// Errors reported by the notification backend after a successful start are
/// not part of this type. They are counted, handed to the installed
/// [`WatchObserver`](crate::WatchObserver) and logged, but never tear the
/// watcher down.
#[derive(Error, Debug)]
pub enum WatchError {
	// Enumeration errors
	#[error("Watch root not found (path: {0:?})")]
	RootNotFound(PathBuf),
	#[error("Failed to enumerate watch directories (path: {1:?}); (error: {0:?})")]
	Enumerate(io::Error, PathBuf),

	// Registration errors
	#[error("Failed to create notification backend (error: {0:?})")]
	Backend(#[from] notify::Error),
	#[error("Failed to register directory with notification backend (path: {1:?}); (error: {0:?})")]
	Register(notify::Error, PathBuf),

	// Lifecycle errors
	#[error("Cannot {operation} a watcher in the {actual} state (expected: {expected})")]
	InvalidState {
		operation: &'static str,
		expected: LifecycleState,
		actual: LifecycleState,
	},
}

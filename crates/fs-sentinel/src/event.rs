use std::{fmt, fs, path::PathBuf};

use chrono::{DateTime, Utc};
use notify::{event::ModifyKind, Event, EventKind};
use serde::{Deserialize, Serialize};

/// The change categories reported to consumers.
///
/// Variants are listed in descending match priority, so a backend kind that
/// could be read more than one way always resolves to the earliest variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
	Create,
	Write,
	Remove,
	Rename,
	#[serde(rename = "CHMOD")]
	PermissionChange,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Operation::Create => write!(f, "CREATE"),
			Operation::Write => write!(f, "WRITE"),
			Operation::Remove => write!(f, "REMOVE"),
			Operation::Rename => write!(f, "RENAME"),
			Operation::PermissionChange => write!(f, "CHMOD"),
		}
	}
}

/// A normalized filesystem change, ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSystemEvent {
	pub path: PathBuf,
	pub operation: Operation,
	/// Size in bytes of the affected path at normalization time, 0 when
	/// unavailable
	pub size: u64,
	pub timestamp: DateTime<Utc>,
}

/// Map a raw backend event kind to the operation it represents.
///
/// Kinds that carry no actionable change, like pure access notifications,
/// map to `None` and are discarded upstream.
pub fn classify(kind: &EventKind) -> Option<Operation> {
	match kind {
		EventKind::Create(_) => Some(Operation::Create),
		EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
			Some(Operation::Write)
		}
		EventKind::Remove(_) => Some(Operation::Remove),
		EventKind::Modify(ModifyKind::Name(_)) => Some(Operation::Rename),
		EventKind::Modify(ModifyKind::Metadata(_)) => Some(Operation::PermissionChange),
		EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
	}
}

/// Normalize a raw backend event into a [`FileSystemEvent`].
///
/// Events without a path or without a recognized operation are discarded.
/// The size is probed from the filesystem on a best effort basis; removed
/// paths and failed probes report 0.
pub fn normalize(event: &Event) -> Option<FileSystemEvent> {
	let operation = classify(&event.kind)?;
	let path = event.paths.first()?.clone();

	let size = if operation == Operation::Remove {
		0
	} else {
		fs::metadata(&path).map(|metadata| metadata.len()).unwrap_or(0)
	};

	Some(FileSystemEvent {
		path,
		operation,
		size,
		timestamp: Utc::now(),
	})
}

use std::{fmt, mem, path::PathBuf, pin::pin, sync::Arc};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::stream::Merge;
use notify::Event;
use tokio::{spawn, task::JoinHandle};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
	enumerate::collect_watch_dirs,
	error::WatchError,
	event::{normalize, FileSystemEvent},
	metrics::WatcherMetrics,
	observer::{NoopWatchObserver, WatchObserver},
	queue::{EventQueue, EventStream},
	registry::WatchRegistry,
};

/// Default capacity of the delivery queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Tuning knobs for a [`FileWatcher`]
#[derive(Debug, Clone)]
pub struct WatcherConfig {
	/// Capacity of the delivery queue; incoming events past it are dropped
	pub queue_capacity: usize,
}

impl Default for WatcherConfig {
	fn default() -> Self {
		Self {
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
		}
	}
}

/// Lifecycle phase of a [`FileWatcher`].
///
/// The lifecycle only ever moves forward: a stopped watcher is not
/// restartable, a fresh one is cheap to create instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Created,
	Started,
	Stopped,
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LifecycleState::Created => write!(f, "created"),
			LifecycleState::Started => write!(f, "started"),
			LifecycleState::Stopped => write!(f, "stopped"),
		}
	}
}

enum State {
	Created,
	Started {
		registry: WatchRegistry,
		stop_tx: chan::Sender<()>,
		handle: JoinHandle<()>,
	},
	Stopped,
}

impl State {
	fn lifecycle(&self) -> LifecycleState {
		match self {
			State::Created => LifecycleState::Created,
			State::Started { .. } => LifecycleState::Started,
			State::Stopped => LifecycleState::Stopped,
		}
	}
}

/// Watches a fixed set of directory trees and delivers normalized change
/// events through a bounded queue.
///
/// The watched set is decided once at [`start`](Self::start) and never
/// changes afterwards. Consumers pull events from the streams handed out by
/// [`events`](Self::events), which stay valid across the whole lifecycle
/// and end once the watcher stopped and the queue drained.
///
/// Dropping a started watcher without calling [`stop`](Self::stop) still
/// tears the background task down, as every channel it reads from closes,
/// but `stop` is the graceful path that waits for the task and deregisters
/// directories deterministically.
pub struct FileWatcher {
	metrics: Arc<WatcherMetrics>,
	observer: Arc<dyn WatchObserver>,
	queue_tx: chan::Sender<FileSystemEvent>,
	queue_rx: chan::Receiver<FileSystemEvent>,
	state: State,
}

impl FileWatcher {
	pub fn new(config: WatcherConfig) -> Self {
		// a zero capacity bounded channel is not constructible
		let (queue_tx, queue_rx) = chan::bounded(config.queue_capacity.max(1));

		Self {
			metrics: Arc::new(WatcherMetrics::new()),
			observer: Arc::new(NoopWatchObserver),
			queue_tx,
			queue_rx,
			state: State::Created,
		}
	}

	/// Install a diagnostics observer; takes effect when the watcher starts
	#[must_use]
	pub fn with_observer(mut self, observer: Arc<dyn WatchObserver>) -> Self {
		self.observer = observer;
		self
	}

	pub fn state(&self) -> LifecycleState {
		self.state.lifecycle()
	}

	/// Get a stream of normalized events.
	///
	/// Streams can be requested before starting and share a single queue,
	/// see [`EventStream`] for the delivery semantics.
	pub fn events(&self) -> EventStream {
		EventStream::new(self.queue_rx.clone())
	}

	/// Get the delivery counters for this watcher
	pub fn stats(&self) -> Arc<WatcherMetrics> {
		Arc::clone(&self.metrics)
	}

	/// Enumerate `roots`, register every directory with the notification
	/// backend and spawn the watch loop.
	///
	/// Must be called from within a Tokio runtime. On failure nothing stays
	/// registered and the watcher remains in the created state, so a
	/// corrected call can try again.
	#[instrument(skip_all, fields(roots = roots.len()))]
	pub fn start(&mut self, roots: &[PathBuf]) -> Result<(), WatchError> {
		let actual = self.state.lifecycle();
		if actual != LifecycleState::Created {
			return Err(WatchError::InvalidState {
				operation: "start",
				expected: LifecycleState::Created,
				actual,
			});
		}

		let dirs = collect_watch_dirs(roots)?;

		let (raw_tx, raw_rx) = chan::unbounded();
		let (stop_tx, stop_rx) = chan::bounded(1);

		let registry = WatchRegistry::bind(dirs, raw_tx)?;
		info!(directories = registry.watched_count(), "Started watching;");

		let handle = spawn(Self::watch_loop(
			raw_rx,
			stop_rx,
			EventQueue::new(
				self.queue_tx.clone(),
				Arc::clone(&self.metrics),
				Arc::clone(&self.observer),
			),
			Arc::clone(&self.metrics),
			Arc::clone(&self.observer),
		));

		self.state = State::Started {
			registry,
			stop_tx,
			handle,
		};

		Ok(())
	}

	/// Signal the watch loop to stop, wait for it to exit and deregister
	/// every watched directory.
	///
	/// Events still queued at this point remain available through
	/// [`events`](Self::events) until drained.
	#[instrument(skip(self))]
	pub async fn stop(&mut self) -> Result<(), WatchError> {
		match mem::replace(&mut self.state, State::Stopped) {
			State::Started {
				registry,
				stop_tx,
				handle,
			} => {
				if stop_tx.send(()).await.is_err() {
					warn!("Watch loop already exited before the stop signal;");
				}

				if let Err(e) = handle.await {
					error!(?e, "Failed to join the watch loop task;");
				}

				// the loop closes the queue on exit, except when it died early
				self.queue_tx.close();

				registry.release();
				info!("Watcher stopped");

				Ok(())
			}
			other => {
				let actual = other.lifecycle();
				self.state = other;

				Err(WatchError::InvalidState {
					operation: "stop",
					expected: LifecycleState::Started,
					actual,
				})
			}
		}
	}

	async fn watch_loop(
		raw_rx: chan::Receiver<notify::Result<Event>>,
		stop_rx: chan::Receiver<()>,
		queue: EventQueue,
		metrics: Arc<WatcherMetrics>,
		observer: Arc<dyn WatchObserver>,
	) {
		enum StreamMessage {
			NewEvent(notify::Result<Event>),
			Stop,
		}

		let mut msg_stream = pin!((
			raw_rx.map(StreamMessage::NewEvent),
			stop_rx.map(|()| StreamMessage::Stop),
		)
			.merge());

		while let Some(msg) = msg_stream.next().await {
			match msg {
				StreamMessage::NewEvent(Ok(event)) => {
					if let Some(event) = normalize(&event) {
						trace!(
							path = %event.path.display(),
							operation = %event.operation,
							"Normalized event;"
						);
						queue.push(event);
					}
				}

				StreamMessage::NewEvent(Err(e)) => {
					metrics.record_runtime_error();
					observer.on_runtime_error(&e);
					error!(?e, "Watcher backend error;");
				}

				StreamMessage::Stop => {
					debug!("Stopping watch loop;");
					break;
				}
			}
		}

		queue.close();
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
	use super::*;

	use std::time::Duration;

	use tempfile::tempdir;
	use tokio::time::timeout;

	#[tokio::test]
	async fn lifecycle_moves_through_all_three_states() {
		let root = tempdir().unwrap();
		let mut watcher = FileWatcher::new(WatcherConfig::default());
		assert_eq!(watcher.state(), LifecycleState::Created);

		watcher
			.start(&[root.path().to_path_buf()])
			.expect("Failed to start watcher");
		assert_eq!(watcher.state(), LifecycleState::Started);

		watcher.stop().await.expect("Failed to stop watcher");
		assert_eq!(watcher.state(), LifecycleState::Stopped);
	}

	#[tokio::test]
	async fn starting_twice_is_rejected() {
		let root = tempdir().unwrap();
		let mut watcher = FileWatcher::new(WatcherConfig::default());
		watcher
			.start(&[root.path().to_path_buf()])
			.expect("Failed to start watcher");

		match watcher.start(&[root.path().to_path_buf()]) {
			Err(WatchError::InvalidState {
				operation: "start",
				actual: LifecycleState::Started,
				..
			}) => {}
			other => panic!("expected an invalid state error, got {other:?}"),
		}

		watcher.stop().await.expect("Failed to stop watcher");
	}

	#[tokio::test]
	async fn stopping_before_start_is_rejected() {
		let mut watcher = FileWatcher::new(WatcherConfig::default());

		match watcher.stop().await {
			Err(WatchError::InvalidState {
				operation: "stop",
				actual: LifecycleState::Created,
				..
			}) => {}
			other => panic!("expected an invalid state error, got {other:?}"),
		}

		// A rejected stop must not corrupt the lifecycle
		assert_eq!(watcher.state(), LifecycleState::Created);
	}

	#[tokio::test]
	async fn stopping_twice_is_rejected() {
		let root = tempdir().unwrap();
		let mut watcher = FileWatcher::new(WatcherConfig::default());
		watcher
			.start(&[root.path().to_path_buf()])
			.expect("Failed to start watcher");
		watcher.stop().await.expect("Failed to stop watcher");

		match watcher.stop().await {
			Err(WatchError::InvalidState {
				operation: "stop",
				actual: LifecycleState::Stopped,
				..
			}) => {}
			other => panic!("expected an invalid state error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn failed_start_leaves_the_watcher_reusable() {
		let root = tempdir().unwrap();
		let missing = root.path().join("missing");

		let mut watcher = FileWatcher::new(WatcherConfig::default());
		let events = watcher.events();

		match watcher.start(&[missing]) {
			Err(WatchError::RootNotFound(_)) => {}
			other => panic!("expected a missing root error, got {other:?}"),
		}
		assert_eq!(watcher.state(), LifecycleState::Created);

		// The failed start acquired nothing, so nothing may flow afterwards
		assert!(timeout(Duration::from_millis(200), events.recv())
			.await
			.is_err());

		watcher
			.start(&[root.path().to_path_buf()])
			.expect("Failed to start watcher after a corrected call");
		watcher.stop().await.expect("Failed to stop watcher");
	}

	#[tokio::test]
	async fn event_streams_end_after_stop() {
		let root = tempdir().unwrap();
		let mut watcher = FileWatcher::new(WatcherConfig::default());
		let events = watcher.events();

		watcher
			.start(&[root.path().to_path_buf()])
			.expect("Failed to start watcher");
		watcher.stop().await.expect("Failed to stop watcher");

		assert_eq!(events.recv().await, None);
	}

	#[tokio::test]
	async fn a_fresh_watcher_can_reuse_the_same_roots() {
		let root = tempdir().unwrap();

		let mut first = FileWatcher::new(WatcherConfig::default());
		first
			.start(&[root.path().to_path_buf()])
			.expect("Failed to start first watcher");
		first.stop().await.expect("Failed to stop first watcher");

		let mut second = FileWatcher::new(WatcherConfig::default());
		second
			.start(&[root.path().to_path_buf()])
			.expect("Failed to start second watcher");
		second.stop().await.expect("Failed to stop second watcher");
	}

	#[tokio::test]
	async fn zero_queue_capacity_is_clamped() {
		let root = tempdir().unwrap();
		let mut watcher = FileWatcher::new(WatcherConfig { queue_capacity: 0 });

		watcher
			.start(&[root.path().to_path_buf()])
			.expect("Failed to start watcher");
		watcher.stop().await.expect("Failed to stop watcher");
	}
}

use std::{
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};

use async_channel as chan;
use futures::Stream;
use tracing::{debug, warn};

use crate::{event::FileSystemEvent, metrics::WatcherMetrics, observer::WatchObserver};

/// Sending half of the delivery queue.
///
/// The queue never applies backpressure to the watch loop: when it is full
/// the incoming event is discarded, counted and reported to the observer,
/// while everything already queued stays untouched.
pub(crate) struct EventQueue {
	tx: chan::Sender<FileSystemEvent>,
	metrics: Arc<WatcherMetrics>,
	observer: Arc<dyn WatchObserver>,
}

impl EventQueue {
	pub(crate) fn new(
		tx: chan::Sender<FileSystemEvent>,
		metrics: Arc<WatcherMetrics>,
		observer: Arc<dyn WatchObserver>,
	) -> Self {
		Self {
			tx,
			metrics,
			observer,
		}
	}

	/// Push without blocking, dropping the incoming event when full
	pub(crate) fn push(&self, event: FileSystemEvent) {
		match self.tx.try_send(event) {
			Ok(()) => self.metrics.record_enqueued(),
			Err(chan::TrySendError::Full(event)) => {
				self.metrics.record_dropped();
				self.observer.on_overflow(&event);
				warn!(
					path = %event.path.display(),
					operation = %event.operation,
					"Delivery queue full, dropping event;"
				);
			}
			Err(chan::TrySendError::Closed(event)) => {
				self.metrics.record_dropped();
				debug!(
					path = %event.path.display(),
					"Delivery queue closed, dropping event;"
				);
			}
		}
	}

	/// Close the queue; consumers still drain whatever was queued
	pub(crate) fn close(&self) {
		self.tx.close();
	}
}

/// Receiving half of the delivery queue, handed out by
/// [`FileWatcher::events`](crate::FileWatcher::events).
///
/// Streams can be cloned and shared across tasks; each event is delivered
/// to exactly one of the clones. Once the watcher stops and the queue
/// drains, [`recv`](Self::recv) returns `None` and the stream ends.
#[derive(Debug, Clone)]
pub struct EventStream {
	// Boxed because the receiver is not Unpin
	rx: Pin<Box<chan::Receiver<FileSystemEvent>>>,
}

impl EventStream {
	pub(crate) fn new(rx: chan::Receiver<FileSystemEvent>) -> Self {
		Self { rx: Box::pin(rx) }
	}

	/// Receive the next event, waiting for one to arrive.
	///
	/// Returns `None` once the watcher stopped and every queued event was
	/// consumed.
	pub async fn recv(&self) -> Option<FileSystemEvent> {
		self.rx.recv().await.ok()
	}
}

impl Stream for EventStream {
	type Item = FileSystemEvent;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		self.get_mut().rx.as_mut().poll_next(cx)
	}
}

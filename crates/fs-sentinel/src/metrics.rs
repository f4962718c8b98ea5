//! Counters for watcher delivery accounting

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// Delivery and error counters for a single watcher.
///
/// Dropped events leave no other trace than these counters and the observer
/// callback, so consumers that care about completeness should read
/// `events_dropped` after stopping.
#[derive(Debug, Default)]
pub struct WatcherMetrics {
	/// Events accepted into the delivery queue
	pub events_enqueued: AtomicU64,
	/// Events discarded because the queue was full
	pub events_dropped: AtomicU64,
	/// Errors reported by the notification backend while watching
	pub runtime_errors: AtomicU64,
}

impl WatcherMetrics {
	/// Create new metrics
	pub fn new() -> Self {
		Self::default()
	}

	/// Record an event accepted into the queue
	pub fn record_enqueued(&self) {
		self.events_enqueued.fetch_add(1, Ordering::Relaxed);
	}

	/// Record an event discarded on overflow
	pub fn record_dropped(&self) {
		self.events_dropped.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a backend error observed at runtime
	pub fn record_runtime_error(&self) {
		self.runtime_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Get drop rate (percentage of normalized events that were discarded)
	pub fn get_drop_rate(&self) -> f64 {
		let enqueued = self.events_enqueued.load(Ordering::Relaxed);
		let dropped = self.events_dropped.load(Ordering::Relaxed);

		if enqueued + dropped == 0 {
			0.0
		} else {
			(dropped as f64 / (enqueued + dropped) as f64) * 100.0
		}
	}

	/// Log current metrics
	pub fn log_metrics(&self) {
		info!(
			"Watcher metrics: enqueued={}, dropped={}, runtime_errors={}, drop_rate={:.2}%",
			self.events_enqueued.load(Ordering::Relaxed),
			self.events_dropped.load(Ordering::Relaxed),
			self.runtime_errors.load(Ordering::Relaxed),
			self.get_drop_rate()
		);
	}
}

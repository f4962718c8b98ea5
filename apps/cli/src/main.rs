use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, ValueEnum};
use fs_sentinel::{FileSystemEvent, FileWatcher, WatcherConfig, DEFAULT_QUEUE_CAPACITY};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
	Human,
	Json,
}

#[derive(Parser, Debug)]
#[command(
	name = "fs-sentinel",
	about = "Watch directory trees and print normalized change events"
)]
struct Cli {
	/// Directories to watch, expanded into their full trees at startup
	#[arg(required = true)]
	roots: Vec<PathBuf>,

	/// Capacity of the delivery queue; events past it are dropped
	#[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
	capacity: usize,

	/// Output format
	#[arg(long, value_enum, default_value = "human")]
	format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	// Events go to stdout, diagnostics to stderr
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info".into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	let mut watcher = FileWatcher::new(WatcherConfig {
		queue_capacity: cli.capacity,
	});
	let events = watcher.events();

	watcher.start(&cli.roots)?;
	info!(roots = ?cli.roots, "Watching for changes, press Ctrl+C to stop");

	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	tokio::select! {
		() = async {
			while let Some(event) = events.recv().await {
				print_event(&event, cli.format);
			}
		} => {},
		() = ctrl_c => {
			info!("Received Ctrl+C, shutting down gracefully...");
		}
	}

	watcher.stop().await?;

	// Events queued before the stop are still owed to the output
	while let Some(event) = events.recv().await {
		print_event(&event, cli.format);
	}

	watcher.stats().log_metrics();

	Ok(())
}

fn print_event(event: &FileSystemEvent, format: OutputFormat) {
	match format {
		OutputFormat::Human => {
			let when = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
			if event.size > 0 {
				println!(
					"[{when}] {} {} ({} bytes)",
					event.operation,
					event.path.display(),
					event.size
				);
			} else {
				println!("[{when}] {} {}", event.operation, event.path.display());
			}
		}
		OutputFormat::Json => match serde_json::to_string(event) {
			Ok(line) => println!("{line}"),
			Err(e) => error!(?e, path = %event.path.display(), "Failed to serialize event;"),
		},
	}
}

//! Log output for the `sqldeploy` binary.
//!
//! Events go to the console and, when a log folder is given, to a daily
//! rolling file. The file is written by a background worker fed through a
//! bounded queue; when the queue is full, logging blocks instead of dropping
//! lines.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix of the log files.
pub const LOG_FILE: &str = "sqldeploy.log";

/// Lines buffered for the file worker before producers block.
pub const LOG_QUEUE_LINES: usize = 8_192;

/// Installs the global subscriber.
///
/// The returned guard flushes the log file when dropped and must be held
/// until the program exits. A log folder that cannot be created is reported
/// on stderr; console logging still works.
pub fn init(verbose: bool, log_folder: Option<&Path>) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let mut guard = None;
    let file_layer = log_folder.and_then(|folder| match file_writer(folder) {
        Ok((writer, worker)) => {
            guard = Some(worker);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(filter()),
            )
        }
        Err(err) => {
            eprintln!(
                "Warning: failed to create log folder {}: {err}",
                folder.display()
            );
            None
        }
    });

    let console_layer = fmt::layer().with_target(false).with_filter(filter());

    if let Err(err) = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
    {
        eprintln!("Warning: logging already initialized: {err}");
    }

    guard
}

/// Creates the log folder and a non-lossy writer to the daily log file in it.
pub fn file_writer(folder: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(folder)?;
    let appender = tracing_appender::rolling::daily(folder, LOG_FILE);
    Ok(NonBlockingBuilder::default()
        .buffered_lines_limit(LOG_QUEUE_LINES)
        .lossy(false)
        .thread_name("sqldeploy-log")
        .finish(appender))
}

use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "csv_ingest=info,info";
const LOG_FILE_PREFIX: &str = "csv_ingest.log";

/// Initializes console logging on stderr, plus a daily-rolling JSON file when
/// `config.dir` is set. `RUST_LOG` overrides the default filter.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // stdout is reserved for command output
    let (console_text, console_json) = if config.json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    let mut guard = None;
    let file_layer = config.dir.as_ref().and_then(|dir| match fs::create_dir_all(dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard = Some(worker);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        Err(e) => {
            eprintln!("cannot create log directory {}: {}", dir.display(), e);
            None
        }
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init();

    guard
}

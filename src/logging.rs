use crate::config::LoggingConfig;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with console and optional file output.
///
/// Console output goes to stderr so tool output on stdout stays clean.
/// The returned guard must be held until exit so buffered file logs are flushed.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    // Respect RUST_LOG if set; otherwise info for our crate
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("neuroprep=info,warn"));

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file_layer, guard) = if config.file_output && fs::create_dir_all(&config.directory).is_ok() {
        // Create a non-blocking file appender for daily log rotation
        let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_name);
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
        (
            Some(fmt::layer().json().with_writer(non_blocking_writer)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    // Set the global default subscriber
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}

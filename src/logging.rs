use crate::constants::LOG_FILE;
use crate::error::{BotError, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with both console and file output.
///
/// The returned guard must live until the process exits so buffered file
/// lines get flushed.
pub fn init_logging(log_dir: &Path, debug: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;

    // Daily rotated JSON lines under the config directory
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    // stdout is reserved for the run summary
    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter(debug)?)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| BotError::Config(format!("Failed to initialize logging: {e}")))?;

    Ok(guard)
}

/// `RUST_LOG` first, then our crate at info (or debug with `--debug`).
pub fn env_filter(debug: bool) -> Result<EnvFilter> {
    let level = if debug { "debug" } else { "info" };
    let directive = format!("mobilizon_bot={level}")
        .parse::<Directive>()
        .map_err(|e| BotError::Config(format!("Invalid log directive: {e}")))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_levels() {
        assert!(env_filter(false).unwrap().to_string().contains("mobilizon_bot=info"));
        assert!(env_filter(true).unwrap().to_string().contains("mobilizon_bot=debug"));
    }
}

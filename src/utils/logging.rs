use crate::error::{ProcessingError, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;

/// Install the global `tracing` subscriber.
///
/// Logs go to stderr (or `log_file`) so stdout carries nothing but the
/// report. Quiet by default: only warnings and errors unless `verbose`.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| ProcessingError::Config(format!("Failed to initialise logging: {}", e)))
}

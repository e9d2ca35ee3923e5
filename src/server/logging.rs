//! Logging initialization and configuration.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::config::{LogFormat, LoggingConfig};

/// Install the global tracing subscriber described by `config`.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?;
    let (writer, ansi) = make_writer(config)?;

    let layer = fmt::layer()
        .with_ansi(ansi)
        .with_target(config.target)
        .with_writer(writer);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match (config.format, config.timestamps) {
        (LogFormat::Text, true) => registry.with(layer).try_init(),
        (LogFormat::Text, false) => registry.with(layer.without_time()).try_init(),
        (LogFormat::Json, true) => registry.with(layer.json()).try_init(),
        (LogFormat::Json, false) => registry.with(layer.json().without_time()).try_init(),
    };
    installed.map_err(|e| LoggingError::Install(e.to_string()))
}

fn make_writer(config: &LoggingConfig) -> Result<(BoxMakeWriter, bool), LoggingError> {
    match config.output.as_str() {
        "stdout" => Ok((
            BoxMakeWriter::new(io::stdout),
            config.color && io::stdout().is_terminal(),
        )),
        "stderr" => Ok((
            BoxMakeWriter::new(io::stderr),
            config.color && io::stderr().is_terminal(),
        )),
        path => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| LoggingError::FileOpen(path.to_string(), e))?;
            Ok((BoxMakeWriter::new(Arc::new(file)), false))
        }
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to open log file '{0}': {1}")]
    FileOpen(String, #[source] io::Error),

    #[error("Failed to install log subscriber: {0}")]
    Install(String),
}

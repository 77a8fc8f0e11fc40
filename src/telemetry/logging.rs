//! Subscriber installation for hosts that bring no subscriber of their own.
//!
//! The engine only emits `tracing` events. [`init_logging`] wires one
//! `EnvFilter` and one formatting layer onto a registry. Either format can
//! be sent to stderr or to a file. ANSI colour is used only on a stderr
//! that is a terminal.

use std::fs::File;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type FormatLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event (default).
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `info` or `native_metrics::spans=debug`.
    pub level: String,
    /// File to log into, truncated on open. Used by both formats; `None`
    /// means stderr.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            output_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Failed to open log file: {0}")]
    FileOpen(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// Where formatted events end up.
enum Destination {
    Stderr,
    File(File),
}

impl Destination {
    fn open(path: Option<&Path>) -> Result<Self, LogError> {
        match path {
            None => Ok(Self::Stderr),
            Some(path) => File::create(path)
                .map(Self::File)
                .map_err(|e| LogError::FileOpen(format!("{}: {e}", path.display()))),
        }
    }

    fn supports_ansi(&self) -> bool {
        matches!(self, Self::Stderr) && std::io::stderr().is_terminal()
    }

    fn into_writer(self) -> BoxMakeWriter {
        match self {
            Self::Stderr => BoxMakeWriter::new(std::io::stderr),
            Self::File(file) => BoxMakeWriter::new(Mutex::new(file)),
        }
    }
}

fn format_layer(format: LogFormat, destination: Destination) -> FormatLayer {
    let ansi = destination.supports_ansi();
    let writer = destination.into_writer();
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    }
}

/// Install the global subscriber described by `config`.
///
/// The filter is validated and the file opened before anything is
/// installed, so a failed call leaves no subscriber behind.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LogError::InvalidFilter(e.to_string()))?;
    let destination = Destination::open(config.output_path.as_deref())?;

    tracing_subscriber::registry()
        .with(format_layer(config.format, destination))
        .with(filter)
        .try_init()
        .map_err(|_| LogError::AlreadyInitialized)
}

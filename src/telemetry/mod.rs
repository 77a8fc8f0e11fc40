//! Structured logging for the metrics engine.

mod logging;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};

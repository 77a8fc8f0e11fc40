//! Engine error types.
//!
//! Usage errors are reported synchronously and never mutate engine state.

use thiserror::Error;

/// Errors returned by the engine's caller-facing operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Already started")]
    AlreadyEnabled,

    #[error("Not running")]
    NotEnabled,

    #[error("Failed to install {hook} hook: {reason}")]
    HookInstall { hook: &'static str, reason: String },
}

impl MetricsError {
    /// Returns true for caller contract violations (wrong lifecycle state).
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::AlreadyEnabled | Self::NotEnabled)
    }
}

/// Result alias used throughout the crate.
pub type MetricsResult<T> = Result<T, MetricsError>;

//! Engine configuration loading from environment variables.
//!
//! All configuration values are loaded from `NATIVE_METRICS_*` environment
//! variables with sensible defaults. Invalid values fall back to defaults
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `NATIVE_METRICS_DIGEST_COMPRESSION` | 1000 | Quantile digest compression (10..=10000) |
//! | `NATIVE_METRICS_EVENT_LOOP` | true | Sample event-loop latency |
//! | `NATIVE_METRICS_GC` | true | Track GC pauses |
//! | `NATIVE_METRICS_FLUSH_INTERVAL` | 10000 | Flush interval (ms, min 100) |
//! | `NATIVE_METRICS_LOG_LEVEL` | info | Log filter directive |
//! | `NATIVE_METRICS_LOG_FORMAT` | json | `json` or `pretty` |
//! | `NATIVE_METRICS_LOG_FILE` | unset | Log file path; stderr when unset |

use std::path::PathBuf;
use std::time::Duration;

use crate::histogram::{DEFAULT_COMPRESSION, MIN_COMPRESSION};
use crate::telemetry::{LogConfig, LogFormat};

const MAX_COMPRESSION: u32 = 10_000;
const DEFAULT_FLUSH_MS: u64 = 10_000;
const MIN_FLUSH_MS: u64 = 100;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Digest compression shared by every histogram.
    pub compression: u32,
    /// Include the event-loop latency sampler.
    pub track_event_loop: bool,
    /// Include the GC pause tracker.
    pub track_gc: bool,
    /// Period of the background flush loop.
    pub flush_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
            track_event_loop: true,
            track_gc: true,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_MS),
        }
    }
}

/// Engine plus logging configuration loaded from env.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub engine: EngineConfig,
    pub log: LogConfig,
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`true/false`, `1/0`, `yes/no`, `on/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Load engine configuration from environment.
fn load_engine_config() -> EngineConfig {
    let compression = parse_u32("NATIVE_METRICS_DIGEST_COMPRESSION", DEFAULT_COMPRESSION);
    let compression = compression.clamp(MIN_COMPRESSION, MAX_COMPRESSION);
    let flush_ms = parse_u64("NATIVE_METRICS_FLUSH_INTERVAL", DEFAULT_FLUSH_MS);
    let flush_ms = flush_ms.max(MIN_FLUSH_MS);
    EngineConfig {
        compression,
        track_event_loop: parse_bool("NATIVE_METRICS_EVENT_LOOP", true),
        track_gc: parse_bool("NATIVE_METRICS_GC", true),
        flush_interval: Duration::from_millis(flush_ms),
    }
}

/// Load logging configuration from environment.
fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("NATIVE_METRICS_LOG_LEVEL")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(defaults.level);
    let format = match std::env::var("NATIVE_METRICS_LOG_FORMAT") {
        Ok(val) if val.trim().eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
        _ => LogFormat::Json,
    };
    let output_path = std::env::var("NATIVE_METRICS_LOG_FILE")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    LogConfig {
        format,
        level,
        output_path,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        engine: load_engine_config(),
        log: load_log_config(),
    }
}

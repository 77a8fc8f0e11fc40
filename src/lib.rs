//! Native runtime metrics
//!
//! An in-process telemetry engine for a managed-language runtime. The host
//! forwards scheduler and garbage-collector callbacks; the engine turns
//! them into latency and pause distributions, reads heap and CPU usage,
//! counts in-flight operations, and hands everything back as a snapshot.
//!
//! # Components
//!
//! - [`histogram`]: exact min/max/sum/count plus t-digest percentiles
//! - [`collectors`]: event-loop latency, GC pauses, heap regions, CPU usage
//! - [`spans`]: finished/unfinished operation counters keyed by name
//! - [`snapshot`]: the collected [`Snapshot`] and its interned encoding
//! - [`reporter`] / [`flush`]: periodic dumping into the `metrics` facade
//!
//! # Usage
//!
//! ```no_run
//! use native_metrics::{EngineConfig, HostBindings, MetricsEngine};
//!
//! let mut engine = MetricsEngine::new(EngineConfig::default(), HostBindings::process());
//! engine.enable()?;
//!
//! let mut op = engine.track("db.query");
//! // ... do the work ...
//! engine.finish(&mut op);
//!
//! let snapshot = engine.dump()?;
//! assert_eq!(snapshot.spans.finished("db.query"), 1);
//! # Ok::<(), native_metrics::MetricsError>(())
//! ```
//!
//! The engine is single-owner and not internally synchronized. Share it
//! with a flush task through [`SharedEngine`].

pub mod collectors;
pub mod config;
pub mod engine;
pub mod error;
pub mod flush;
pub mod histogram;
pub mod host;
pub mod reporter;
pub mod snapshot;
pub mod spans;
pub mod telemetry;

pub use collectors::{CpuDelta, GcKind, LoopUtilization};
pub use config::EngineConfig;
pub use engine::{MetricsEngine, SharedEngine};
pub use error::{MetricsError, MetricsResult};
pub use histogram::{Histogram, HistogramSummary};
#[cfg(unix)]
pub use host::RusageCpuSource;
pub use host::{
    Clock, CpuUsage, CpuUsageSource, GcHooks, HeapIntrospector, HeapRegionStats, HostBindings,
    MonotonicClock, NoHeap, NoopHooks, SchedulerHooks,
};
pub use snapshot::{Snapshot, SnapshotValue};
pub use spans::{SpanHandle, SpanTotals, SpanTracker};

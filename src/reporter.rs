//! Flattening of snapshots into named metric points.
//!
//! Names follow the `runtime.node.*` scheme the reporting backend expects.
//! Histograms expand into `.min/.max/.sum/.total/.avg/.count/.median/
//! .95percentile`; `.sum`, `.total` and `.count` are counts, everything
//! else is a gauge. [`publish`] forwards points to the `metrics` facade,
//! leaving exporter choice to the host.

use metrics::Label;

use crate::collectors::heap::HeapRegion;
use crate::collectors::GcKind;
use crate::histogram::HistogramSummary;
use crate::snapshot::Snapshot;

const EVENT_LOOP_DELAY: &str = "runtime.node.event_loop.delay";
const GC_PAUSE: &str = "runtime.node.gc.pause";
const GC_PAUSE_BY_TYPE: &str = "runtime.node.gc.pause.by.type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Count,
}

/// One named value with optional `key:value` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub tag: Option<(&'static str, String)>,
}

impl MetricPoint {
    fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Gauge,
            value,
            tag: None,
        }
    }

    fn count(name: impl Into<String>, value: f64) -> Self {
        Self {
            kind: MetricKind::Count,
            ..Self::gauge(name, value)
        }
    }

    fn tagged(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.tag = Some((key, value.into()));
        self
    }

    /// Tag rendered as `key:value`.
    pub fn tag_string(&self) -> Option<String> {
        self.tag.as_ref().map(|(k, v)| format!("{k}:{v}"))
    }
}

fn histogram_points(
    out: &mut Vec<MetricPoint>,
    name: &str,
    summary: &HistogramSummary,
    tag: Option<(&'static str, &str)>,
) {
    let points = [
        MetricPoint::gauge(format!("{name}.min"), summary.min as f64),
        MetricPoint::gauge(format!("{name}.max"), summary.max as f64),
        MetricPoint::count(format!("{name}.sum"), summary.sum as f64),
        MetricPoint::count(format!("{name}.total"), summary.sum as f64),
        MetricPoint::gauge(format!("{name}.avg"), summary.avg as f64),
        MetricPoint::count(format!("{name}.count"), summary.count as f64),
        MetricPoint::gauge(format!("{name}.median"), summary.median as f64),
        MetricPoint::gauge(format!("{name}.95percentile"), summary.p95 as f64),
    ];
    out.extend(points.into_iter().map(|point| match tag {
        Some((key, value)) => point.tagged(key, value),
        None => point,
    }));
}

/// Round to two decimals, matching the precision CPU gauges are sent with.
fn two_decimals(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Flatten `snapshot` into metric points.
pub fn metric_points(snapshot: &Snapshot) -> Vec<MetricPoint> {
    let mut out = Vec::new();

    out.push(MetricPoint::gauge(
        "runtime.node.cpu.user",
        two_decimals(snapshot.cpu.user_percent()),
    ));
    out.push(MetricPoint::gauge(
        "runtime.node.cpu.system",
        two_decimals(snapshot.cpu.system_percent()),
    ));
    out.push(MetricPoint::gauge(
        "runtime.node.cpu.total",
        two_decimals(snapshot.cpu.total_percent()),
    ));

    out.push(MetricPoint::gauge(
        "runtime.node.process.uptime",
        snapshot.uptime_nanos as f64 / 1e9,
    ));

    histogram_points(&mut out, EVENT_LOOP_DELAY, &snapshot.event_loop, None);
    // Omitted until a loop iteration has completed.
    if let Some(ratio) = snapshot.loop_utilization.ratio() {
        out.push(MetricPoint::gauge("runtime.node.event_loop.utilization", ratio));
    }

    for (kind, summary) in &snapshot.gc {
        match kind {
            GcKind::All => histogram_points(&mut out, GC_PAUSE, summary, None),
            other => histogram_points(
                &mut out,
                GC_PAUSE_BY_TYPE,
                summary,
                Some(("gc_type", other.as_str())),
            ),
        }
    }

    for region in &snapshot.heap {
        let HeapRegion::Available(stats) = region else {
            continue;
        };
        let space = stats.name.as_str();
        out.push(
            MetricPoint::gauge("runtime.node.heap.size.by.space", stats.size_bytes as f64)
                .tagged("heap_space", space),
        );
        out.push(
            MetricPoint::gauge("runtime.node.heap.used_size.by.space", stats.used_bytes as f64)
                .tagged("heap_space", space),
        );
        out.push(
            MetricPoint::gauge(
                "runtime.node.heap.available_size.by.space",
                stats.available_bytes as f64,
            )
            .tagged("heap_space", space),
        );
        out.push(
            MetricPoint::gauge(
                "runtime.node.heap.physical_size.by.space",
                stats.physical_size_bytes as f64,
            )
            .tagged("heap_space", space),
        );
    }

    let spans = &snapshot.spans;
    out.push(MetricPoint::gauge("runtime.node.spans.finished", spans.finished_total as f64));
    out.push(MetricPoint::gauge("runtime.node.spans.unfinished", spans.unfinished_total as f64));
    for (name, count) in &spans.finished {
        out.push(
            MetricPoint::gauge("runtime.node.spans.finished.by.name", *count as f64)
                .tagged("span_name", name.as_str()),
        );
    }
    for (name, count) in &spans.unfinished {
        out.push(
            MetricPoint::gauge("runtime.node.spans.unfinished.by.name", *count as f64)
                .tagged("span_name", name.as_str()),
        );
    }

    out
}

/// Emit `snapshot` through the installed `metrics` recorder.
pub fn publish(snapshot: &Snapshot) {
    for point in metric_points(snapshot) {
        let labels: Vec<Label> = point
            .tag
            .iter()
            .map(|(key, value)| Label::new(*key, value.clone()))
            .collect();
        match point.kind {
            MetricKind::Gauge => metrics::gauge!(point.name, labels).set(point.value),
            MetricKind::Count => metrics::counter!(point.name, labels).increment(point.value as u64),
        }
    }
}

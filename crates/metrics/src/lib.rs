//! Metrics and tracing setup for partkv.
//!
//! Provides a global [`KvMetrics`] singleton backed by the `prometheus`
//! crate and a text encoder for scraping.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

static METRICS: OnceLock<KvMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static KvMetrics {
    METRICS.get_or_init(KvMetrics::new)
}

/// All Prometheus metrics for a partkv coordinator.
pub struct KvMetrics {
    pub registry: Registry,

    // ── Operation counters ──
    pub gets: IntCounter,
    pub puts: IntCounter,
    pub deletes: IntCounter,
    pub range_scans: IntCounter,

    // ── Node stream lifecycle ──
    pub streams_opened: IntCounter,
    pub streams_closed: IntCounter,

    // ── Quorum failures, by kind ──
    pub quorum_failures: IntCounterVec,

    // ── Latency ──
    pub op_latency_secs: HistogramVec,
}

impl std::fmt::Debug for KvMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvMetrics").finish_non_exhaustive()
    }
}

/// Default histogram buckets (seconds) for operation latency.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help)).expect("static counter opts are valid")
}

impl KvMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let gets = counter("partkv_gets_total", "Cell and row reads");
        let puts = counter("partkv_puts_total", "Cell writes");
        let deletes = counter("partkv_deletes_total", "Cell deletes");
        let range_scans = counter("partkv_range_scans_total", "Range scans started");
        let streams_opened = counter(
            "partkv_streams_opened_total",
            "Per-node range streams opened",
        );
        let streams_closed = counter(
            "partkv_streams_closed_total",
            "Per-node range streams released",
        );

        let quorum_failures = IntCounterVec::new(
            Opts::new(
                "partkv_quorum_failures_total",
                "Operations rejected for missing their success threshold, by kind",
            ),
            &["kind"],
        )
        .expect("quorum_failures counter vec");

        let op_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "partkv_op_latency_seconds",
                "Coordinator operation latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["op_type"],
        )
        .expect("op_latency_secs histogram");

        for collector in [
            &gets,
            &puts,
            &deletes,
            &range_scans,
            &streams_opened,
            &streams_closed,
        ] {
            registry
                .register(Box::new(collector.clone()))
                .expect("register counter");
        }
        registry
            .register(Box::new(quorum_failures.clone()))
            .expect("register quorum_failures");
        registry
            .register(Box::new(op_latency_secs.clone()))
            .expect("register op_latency_secs");

        Self {
            registry,
            gets,
            puts,
            deletes,
            range_scans,
            streams_opened,
            streams_closed,
            quorum_failures,
            op_latency_secs,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

/// Helper: start an operation latency timer. Records elapsed time on drop.
pub fn start_op_timer(op_type: &str) -> prometheus::HistogramTimer {
    metrics()
        .op_latency_secs
        .with_label_values(&[op_type])
        .start_timer()
}

/// Helper: count one quorum failure of the given kind.
pub fn record_quorum_failure(kind: &str) {
    metrics().quorum_failures.with_label_values(&[kind]).inc();
}

// ────────────────────────── Tests ──────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Histogram;

    #[test]
    fn test_metrics_init_and_increment() {
        let m = metrics();

        let before = m.gets.get();
        m.gets.inc();
        m.gets.inc();
        assert_eq!(m.gets.get(), before + 2);

        let before = m
            .quorum_failures
            .with_label_values(&["insufficient_reads"])
            .get();
        record_quorum_failure("insufficient_reads");
        assert_eq!(
            m.quorum_failures
                .with_label_values(&["insufficient_reads"])
                .get(),
            before + 1
        );
    }

    #[test]
    fn test_encode_metrics_format() {
        metrics().streams_opened.inc();

        let output = encode_metrics();
        assert!(output.contains("partkv_streams_opened_total"));
        assert!(output.contains("partkv_gets_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_histogram_records() {
        let m = metrics();

        m.op_latency_secs
            .with_label_values(&["test_op"])
            .observe(0.005);
        m.op_latency_secs
            .with_label_values(&["test_op"])
            .observe(0.010);

        let h: Histogram = m.op_latency_secs.with_label_values(&["test_op"]);
        assert_eq!(h.get_sample_count(), 2);
        assert!((h.get_sample_sum() - 0.015).abs() < 1e-9);
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }
}

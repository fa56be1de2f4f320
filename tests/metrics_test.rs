//! Tests for the emitted probe metrics.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use tokio_util::sync::CancellationToken;

use up::client::{QueryExecutor, QueryResponse, QueryValue, SamplePair, VectorSample};
use up::telemetry;
use up::{
    LabelSet, NamedQueryProbe, Outcome, OutcomeCounters, Probe, ProbeKind, QuerySpec, ReadProbe,
    Result, UpError,
};

// ============================================================================
// Mock executors
// ============================================================================

/// Answers every query with one marker sample written `age` ago.
struct MarkerExecutor {
    age: Duration,
}

#[async_trait]
impl QueryExecutor for MarkerExecutor {
    async fn instant(&self, _query: &str, _at: Option<SystemTime>) -> Result<QueryResponse> {
        let written = SystemTime::now() - self.age;
        let millis = written.duration_since(UNIX_EPOCH).unwrap().as_millis();
        Ok(QueryResponse {
            value: QueryValue::Vector(vec![VectorSample {
                metric: Default::default(),
                value: SamplePair(0.0, millis.to_string()),
            }]),
            warnings: Vec::new(),
            trace_id: None,
        })
    }
}

struct FailingExecutor;

#[async_trait]
impl QueryExecutor for FailingExecutor {
    async fn instant(&self, _query: &str, _at: Option<SystemTime>) -> Result<QueryResponse> {
        Err(UpError::Http("connection reset".into()))
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum counter values for `name` whose `label` equals `value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| {
            key.key()
                .labels()
                .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// All histogram samples recorded under `name`.
fn histogram_values(snapshot: &SnapshotVec, name: &str) -> Vec<f64> {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
        .flat_map(|(_, _, _, value)| match value {
            DebugValue::Histogram(values) => values.iter().map(|v| v.0).collect(),
            _ => Vec::new(),
        })
        .collect()
}

fn has_gauge(snapshot: &SnapshotVec, name: &str, query: &str) -> bool {
    snapshot.iter().any(|(key, _, _, _)| {
        key.kind() == MetricKind::Gauge
            && key.key().name() == name
            && key
                .key()
                .labels()
                .any(|l| l.key() == "query" && l.value() == query)
    })
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn outcomes_are_published_per_probe_kind() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let counters = OutcomeCounters::new();
        counters.record(&ProbeKind::Write, Outcome::Success);
        counters.record(&ProbeKind::Write, Outcome::Success);
        counters.record(&ProbeKind::Write, Outcome::Error);
        counters.record(&ProbeKind::Read, Outcome::Error);
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(
        counter_with_label(&snapshot, telemetry::REMOTE_WRITES_TOTAL, "result", "success"),
        2
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REMOTE_WRITES_TOTAL, "result", "error"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::QUERIES_TOTAL, "result", "error"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::QUERIES_TOTAL, "result", "success"),
        0
    );
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` keeps the sync `with_local_recorder` closure on the
/// current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn named_queries_record_executions_errors_and_duration() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let shutdown = CancellationToken::new();
                let counters = OutcomeCounters::new();
                let ok = NamedQueryProbe::new(
                    Arc::new(MarkerExecutor { age: Duration::ZERO }),
                    counters.clone(),
                );
                let failing = NamedQueryProbe::new(Arc::new(FailingExecutor), counters);

                ok.run(&QuerySpec::new("healthy", "up"), &shutdown).await;
                failing
                    .run(&QuerySpec::new("broken", "up"), &shutdown)
                    .await;
                failing
                    .run(&QuerySpec::new("broken", "up"), &shutdown)
                    .await;
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    let executed = telemetry::CUSTOM_QUERY_EXECUTED_TOTAL;
    let errors = telemetry::CUSTOM_QUERY_ERRORS_TOTAL;
    assert_eq!(counter_with_label(&snapshot, executed, "query", "healthy"), 1);
    assert_eq!(counter_with_label(&snapshot, errors, "query", "healthy"), 0);
    assert_eq!(counter_with_label(&snapshot, executed, "query", "broken"), 2);
    assert_eq!(counter_with_label(&snapshot, errors, "query", "broken"), 2);

    // The duration gauge is set on failures too.
    assert!(has_gauge(&snapshot, telemetry::CUSTOM_QUERY_LAST_DURATION, "healthy"));
    assert!(has_gauge(&snapshot, telemetry::CUSTOM_QUERY_LAST_DURATION, "broken"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn read_probe_records_sample_age() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let labels = LabelSet::default().with_metric_name("up");
                let probe = ReadProbe::new(
                    Arc::new(MarkerExecutor {
                        age: Duration::from_secs(30),
                    }),
                    &labels,
                    Duration::from_secs(5),
                    Duration::from_secs(15),
                );
                probe.execute().await
            })
        })
    });
    assert!(matches!(result, Err(UpError::StaleSample { .. })));

    let snapshot = snapshotter.snapshot().into_vec();

    // Recorded even though the sample was too old.
    let ages = histogram_values(&snapshot, telemetry::METRIC_VALUE_DIFFERENCE);
    assert_eq!(ages.len(), 1);
    assert!((30.0..35.0).contains(&ages[0]), "age {}", ages[0]);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let counters = OutcomeCounters::new();
    let probe = NamedQueryProbe::new(Arc::new(FailingExecutor), counters.clone());
    let outcome = probe
        .run(&QuerySpec::new("q", "up"), &CancellationToken::new())
        .await;
    assert_eq!(outcome, Outcome::Error);
    assert_eq!(counters.snapshot(&ProbeKind::Query("q".into())).errors, 1);
}

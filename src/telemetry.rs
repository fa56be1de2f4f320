//! Telemetry metric names and the Prometheus exporter.
//!
//! Probe outcomes are published through the `metrics` facade. Without a
//! recorder installed (e.g. in tests), all metric calls are no-ops. The
//! binary installs the Prometheus recorder built by [`exporter()`] and runs
//! its HTTP listener as a supervised task.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `up_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `result`: outcome of a write or read probe: "success" or "error"
//! - `query`: name of a configured custom query

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusRecorder};

use crate::{Result, UpError};

/// Total remote-write requests made by the write probe.
///
/// Labels: `result` ("success" | "error").
pub const REMOTE_WRITES_TOTAL: &str = "up_remote_writes_total";

/// Total queries made by the read probe.
///
/// Labels: `result` ("success" | "error").
pub const QUERIES_TOTAL: &str = "up_queries_total";

/// Age in seconds of the sample found by the read probe.
pub const METRIC_VALUE_DIFFERENCE: &str = "up_metric_value_difference";

/// Total executions of a custom query, whatever the outcome.
///
/// Labels: `query`.
pub const CUSTOM_QUERY_EXECUTED_TOTAL: &str = "up_custom_query_executed_total";

/// Total failed executions of a custom query.
///
/// Labels: `query`.
pub const CUSTOM_QUERY_ERRORS_TOTAL: &str = "up_custom_query_errors_total";

/// Duration in seconds of the most recent execution of a custom query.
///
/// Labels: `query`.
pub const CUSTOM_QUERY_LAST_DURATION: &str = "up_custom_query_last_duration";

/// Histogram buckets for [`METRIC_VALUE_DIFFERENCE`]: 16 linear buckets
/// starting at 4s with a 0.25s width.
pub fn value_difference_buckets() -> Vec<f64> {
    (0..16).map(|i| 4.0 + 0.25 * f64::from(i)).collect()
}

/// Future driving the exporter's HTTP listener.
pub type ExporterFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Build the Prometheus recorder and the HTTP listener future serving it.
///
/// The recorder still has to be installed (see [`install()`]); the future
/// serves `/metrics` on `addr` until dropped. Must be called from within a
/// tokio runtime.
pub fn exporter(addr: SocketAddr) -> Result<(PrometheusRecorder, ExporterFuture)> {
    let (recorder, serve) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(METRIC_VALUE_DIFFERENCE.to_string()),
            &value_difference_buckets(),
        )
        .map_err(|e| UpError::Configuration(format!("invalid histogram buckets: {e}")))?
        .build()
        .map_err(|e| UpError::Configuration(format!("failed to build exporter on {addr}: {e}")))?;

    let serve: ExporterFuture = Box::pin(async move {
        serve
            .await
            .map_err(|e| UpError::Http(format!("metrics listener failed: {e:?}")))
    });

    Ok((recorder, serve))
}

/// Install `recorder` as the process-wide recorder and describe all metrics.
pub fn install(recorder: PrometheusRecorder) -> Result<()> {
    metrics::set_global_recorder(recorder)
        .map_err(|e| UpError::Configuration(format!("failed to install recorder: {e}")))?;
    describe();
    Ok(())
}

fn describe() {
    metrics::describe_counter!(REMOTE_WRITES_TOTAL, "Total number of remote write requests.");
    metrics::describe_counter!(QUERIES_TOTAL, "The total number of queries made.");
    metrics::describe_histogram!(
        METRIC_VALUE_DIFFERENCE,
        metrics::Unit::Seconds,
        "The time difference between the current timestamp and the timestamp in the metrics value."
    );
    metrics::describe_counter!(
        CUSTOM_QUERY_EXECUTED_TOTAL,
        "The total number of custom specified queries executed."
    );
    metrics::describe_counter!(
        CUSTOM_QUERY_ERRORS_TOTAL,
        "The total number of custom specified queries that failed."
    );
    metrics::describe_gauge!(
        CUSTOM_QUERY_LAST_DURATION,
        metrics::Unit::Seconds,
        "The duration of the query execution last time the query was executed."
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_difference_buckets_are_linear() {
        let buckets = value_difference_buckets();
        assert_eq!(buckets.len(), 16);
        assert_eq!(buckets[0], 4.0);
        assert_eq!(buckets[1], 4.25);
        assert_eq!(buckets[15], 7.75);
    }
}

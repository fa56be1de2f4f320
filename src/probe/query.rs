//! Named query probe: run an arbitrary read-only query and time it.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::UpError;
use crate::client::query::QueryExecutor;
use crate::counters::{Outcome, OutcomeCounters, ProbeKind};
use crate::telemetry;

/// A named query from the queries file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuerySpec {
    pub name: String,
    pub query: String,
}

impl QuerySpec {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
        }
    }
}

/// Executes named queries, recording one outcome and one duration per run.
///
/// Success depends only on transport and response status; the result
/// itself is not inspected.
#[derive(Clone)]
pub struct NamedQueryProbe {
    executor: Arc<dyn QueryExecutor>,
    counters: OutcomeCounters,
}

impl NamedQueryProbe {
    pub fn new(executor: Arc<dyn QueryExecutor>, counters: OutcomeCounters) -> Self {
        Self { executor, counters }
    }

    /// Run `spec` once. An in-flight query is abandoned, and counted as an
    /// error, when `shutdown` fires.
    pub async fn run(&self, spec: &QuerySpec, shutdown: &CancellationToken) -> Outcome {
        debug!(name = %spec.name, query = %spec.query, "running specified query");

        let started = Instant::now();
        let result = tokio::select! {
            result = self.executor.instant(&spec.query, Some(SystemTime::now())) => result,
            _ = shutdown.cancelled() => Err(UpError::Cancelled),
        };
        let duration = started.elapsed().as_secs_f64();

        metrics::gauge!(telemetry::CUSTOM_QUERY_LAST_DURATION, "query" => spec.name.clone())
            .set(duration);

        match &result {
            Ok(response) => debug!(
                name = %spec.name,
                duration,
                warnings = ?response.warnings,
                result_type = response.value.type_name(),
                trace_id = response.trace_id.as_deref().unwrap_or(""),
                "successfully executed specified query"
            ),
            Err(e) => info!(
                name = %spec.name,
                duration,
                error = %e,
                "failed to execute specified query"
            ),
        }

        let outcome = Outcome::from(&result);
        self.counters.record(&ProbeKind::Query(spec.name.clone()), outcome);
        outcome
    }
}

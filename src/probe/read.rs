//! Read probe: find the marker sample and check its freshness.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::debug;

use crate::client::QueryValue;
use crate::client::query::QueryExecutor;
use crate::client::remote_write::unix_millis;
use crate::counters::ProbeKind;
use crate::labels::LabelSet;
use crate::telemetry;
use crate::traits::Probe;
use crate::{Result, UpError};

/// Queries the marker series and fails when it is missing, ambiguous, or
/// older than the allowed latency.
pub struct ReadProbe {
    executor: Arc<dyn QueryExecutor>,
    selector: String,
    lookback: Duration,
    max_latency: Duration,
}

impl ReadProbe {
    /// `lookback` shifts the evaluation time into the past so the query
    /// targets the window the write probe has already filled.
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        labels: &LabelSet,
        lookback: Duration,
        max_latency: Duration,
    ) -> Self {
        Self {
            executor,
            selector: labels.selector(),
            lookback,
            max_latency,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }
}

#[async_trait]
impl Probe for ReadProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Read
    }

    async fn execute(&self) -> Result<()> {
        let now = SystemTime::now();
        let at = now.checked_sub(self.lookback).unwrap_or(now);

        let response = self.executor.instant(&self.selector, Some(at)).await?;
        let samples = match response.value {
            QueryValue::Vector(samples) => samples,
            other => {
                return Err(UpError::UnexpectedResult(format!(
                    "expected vector, got {}",
                    other.type_name()
                )));
            }
        };
        if samples.len() != 1 {
            return Err(UpError::Cardinality(samples.len()));
        }

        // The written value is the write time in milliseconds.
        let written_ms = samples[0].value.value()?;
        let age_secs = (unix_millis(SystemTime::now()) as f64 - written_ms) / 1000.0;
        if !age_secs.is_finite() {
            return Err(UpError::UnexpectedResult(format!(
                "sample value {written_ms} is not a finite timestamp"
            )));
        }

        metrics::histogram!(telemetry::METRIC_VALUE_DIFFERENCE).record(age_secs);
        debug!(age_secs, selector = %self.selector, "read back marker sample");

        if age_secs > self.max_latency.as_secs_f64() {
            return Err(UpError::StaleSample { age_secs });
        }

        Ok(())
    }
}

//! Process-wide outcome counters.
//!
//! Every probe completion records exactly one [`Outcome`] against its
//! [`ProbeKind`]. The tallies are kept in a concurrent map so any task can
//! increment them, and each increment is mirrored to the `metrics` facade for
//! exposition. Verdicts read a [`Tally`] snapshot once the producing runner
//! has stopped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::telemetry;

/// What a probe execution was checking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Remote-write of the marker sample.
    Write,
    /// Read-back of the marker sample.
    Read,
    /// A named custom query.
    Query(String),
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Write => f.write_str("write"),
            ProbeKind::Read => f.write_str("read"),
            ProbeKind::Query(name) => write!(f, "query/{name}"),
        }
    }
}

/// Classification of a single probe execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    /// Label value used for the `result` metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

impl<T, E> From<&std::result::Result<T, E>> for Outcome {
    fn from(result: &std::result::Result<T, E>) -> Self {
        if result.is_ok() {
            Outcome::Success
        } else {
            Outcome::Error
        }
    }
}

/// Point-in-time success/error counts for one probe kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub successes: u64,
    pub errors: u64,
}

impl Tally {
    pub fn new(successes: u64, errors: u64) -> Self {
        Self { successes, errors }
    }

    /// Total number of recorded outcomes.
    pub fn total(&self) -> u64 {
        self.successes + self.errors
    }
}

#[derive(Debug, Default)]
struct AtomicTally {
    successes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicTally {
    fn bump(&self, outcome: Outcome) {
        let slot = match outcome {
            Outcome::Success => &self.successes,
            Outcome::Error => &self.errors,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self) -> Tally {
        Tally {
            successes: self.successes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Shared, cheaply clonable outcome counters.
#[derive(Debug, Clone, Default)]
pub struct OutcomeCounters {
    tallies: Arc<DashMap<ProbeKind, AtomicTally>>,
}

impl OutcomeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome for `kind` and publish it as a metric.
    pub fn record(&self, kind: &ProbeKind, outcome: Outcome) {
        match self.tallies.get(kind) {
            Some(tally) => tally.bump(outcome),
            None => self.tallies.entry(kind.clone()).or_default().bump(outcome),
        }
        publish(kind, outcome);
    }

    /// Snapshot the counts recorded for `kind` so far.
    ///
    /// Safe to call while increments are still happening, but only exact
    /// once the producer has stopped.
    pub fn snapshot(&self, kind: &ProbeKind) -> Tally {
        self.tallies
            .get(kind)
            .map(|tally| tally.load())
            .unwrap_or_default()
    }
}

fn publish(kind: &ProbeKind, outcome: Outcome) {
    match kind {
        ProbeKind::Write => {
            metrics::counter!(telemetry::REMOTE_WRITES_TOTAL, "result" => outcome.as_str())
                .increment(1);
        }
        ProbeKind::Read => {
            metrics::counter!(telemetry::QUERIES_TOTAL, "result" => outcome.as_str()).increment(1);
        }
        ProbeKind::Query(name) => {
            metrics::counter!(telemetry::CUSTOM_QUERY_EXECUTED_TOTAL, "query" => name.clone())
                .increment(1);
            if outcome == Outcome::Error {
                metrics::counter!(telemetry::CUSTOM_QUERY_ERRORS_TOTAL, "query" => name.clone())
                    .increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_snapshots_to_zero() {
        let counters = OutcomeCounters::new();
        assert_eq!(counters.snapshot(&ProbeKind::Write), Tally::default());
    }

    #[test]
    fn kinds_are_tallied_independently() {
        let counters = OutcomeCounters::new();
        counters.record(&ProbeKind::Write, Outcome::Success);
        counters.record(&ProbeKind::Write, Outcome::Error);
        counters.record(&ProbeKind::Write, Outcome::Success);
        counters.record(&ProbeKind::Read, Outcome::Error);
        counters.record(&ProbeKind::Query("a".into()), Outcome::Success);

        assert_eq!(counters.snapshot(&ProbeKind::Write), Tally::new(2, 1));
        assert_eq!(counters.snapshot(&ProbeKind::Read), Tally::new(0, 1));
        assert_eq!(
            counters.snapshot(&ProbeKind::Query("a".into())),
            Tally::new(1, 0)
        );
        assert_eq!(
            counters.snapshot(&ProbeKind::Query("b".into())),
            Tally::default()
        );
    }

    #[test]
    fn clones_share_state() {
        let counters = OutcomeCounters::new();
        let clone = counters.clone();
        clone.record(&ProbeKind::Read, Outcome::Success);
        assert_eq!(counters.snapshot(&ProbeKind::Read).total(), 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let counters = OutcomeCounters::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = counters.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record(&ProbeKind::Write, Outcome::Success);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.snapshot(&ProbeKind::Write).successes, 8000);
    }

    #[test]
    fn outcome_from_result() {
        let ok: Result<(), ()> = Ok(());
        let err: Result<(), ()> = Err(());
        assert_eq!(Outcome::from(&ok), Outcome::Success);
        assert_eq!(Outcome::from(&err), Outcome::Error);
    }
}

//! Fixed-period probe scheduling.
//!
//! Every tick spawns one execution of the probe under a fresh cancellation
//! scope that is bound only to that tick's deadline (`tick + period`). The
//! scope is not a child of the shutdown token. Shutting down stops the
//! clock but leaves a request that is already in flight alone. The
//! in-flight execution is then given until its deadline to finish before
//! the verdict is computed.
//!
//! Before a new execution is spawned, the previous one is drained. Its
//! deadline coincides with the new tick, so at most one execution is ever
//! in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::counters::{Outcome, OutcomeCounters, ProbeKind};
use crate::traits::Probe;
use crate::verdict;
use crate::{Result, UpError};

/// Drives one probe on a fixed-period clock until shutdown.
#[derive(Debug, Clone)]
pub struct PeriodicRunner {
    period: Duration,
    threshold: f64,
    initial_delay: Duration,
    counters: OutcomeCounters,
}

impl PeriodicRunner {
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn new(period: Duration, threshold: f64, counters: OutcomeCounters) -> Self {
        assert!(!period.is_zero(), "probe period must be non-zero");
        Self {
            period,
            threshold,
            initial_delay: Duration::ZERO,
            counters,
        }
    }

    /// Wait `delay` before the clock starts.
    ///
    /// Shutdown during the delay ends the runner without a verdict.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Run `probe` once per period until `shutdown` fires, then drain the
    /// in-flight execution and evaluate the success ratio.
    pub async fn run(&self, probe: Arc<dyn Probe>, shutdown: CancellationToken) -> Result<()> {
        let kind = probe.kind();

        if !self.initial_delay.is_zero() {
            info!(probe = %kind, delay = ?self.initial_delay, "waiting for initial delay before probing");
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(probe = %kind, "shut down during initial delay");
                    return Ok(());
                }
                _ = sleep(self.initial_delay) => {}
            }
        }

        info!(probe = %kind, period = ?self.period, "starting periodic probe");

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<Execution> = None;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(previous) = in_flight.take() {
                        previous.drain(&self.counters).await;
                    }
                    in_flight = Some(Execution::spawn(
                        probe.clone(),
                        self.counters.clone(),
                        self.period,
                    ));
                }
            }
        }

        // None when shutdown came before the first tick.
        if let Some(last) = in_flight.take() {
            last.drain(&self.counters).await;
        }

        verdict::evaluate(self.counters.snapshot(&kind), self.threshold)
    }
}

/// One deadline-bound probe execution.
struct Execution {
    kind: ProbeKind,
    deadline: Instant,
    scope: CancellationToken,
    handle: JoinHandle<()>,
}

impl Execution {
    fn spawn(probe: Arc<dyn Probe>, counters: OutcomeCounters, period: Duration) -> Self {
        let kind = probe.kind();
        let deadline = Instant::now() + period;
        let scope = CancellationToken::new();

        let task_kind = kind.clone();
        let task_scope = scope.clone();
        // Fires the scope even if the probe panics.
        let guard = scope.clone().drop_guard();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            let result = tokio::select! {
                result = probe.execute() => result,
                _ = sleep_until(deadline) => Err(UpError::DeadlineExceeded(period)),
                _ = task_scope.cancelled() => Err(UpError::Cancelled),
            };
            let elapsed = started.elapsed().as_secs_f64();

            match &result {
                Ok(()) => debug!(probe = %task_kind, elapsed, "probe succeeded"),
                Err(e) => error!(probe = %task_kind, elapsed, error = %e, "probe failed"),
            }
            counters.record(&task_kind, Outcome::from(&result));
        });

        Self {
            kind,
            deadline,
            scope,
            handle,
        }
    }

    /// Wait for natural completion until the deadline, then force-cancel and
    /// wait for the task to finish either way.
    async fn drain(mut self, counters: &OutcomeCounters) {
        let joined = tokio::select! {
            joined = &mut self.handle => joined,
            _ = sleep_until(self.deadline) => {
                self.scope.cancel();
                (&mut self.handle).await
            }
        };
        self.finish(joined, counters);
    }

    fn finish(&self, joined: std::result::Result<(), JoinError>, counters: &OutcomeCounters) {
        if let Err(e) = joined {
            error!(probe = %self.kind, error = %e, "probe execution aborted");
            counters.record(&self.kind, Outcome::Error);
        }
    }
}

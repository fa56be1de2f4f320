//! Continuous sweeps over the configured named queries.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;
use crate::probe::{NamedQueryProbe, QuerySpec};

/// Runs every named query in order, one at a time, over and over until
/// shutdown.
///
/// Queries share the read endpoint, so they are never run concurrently.
/// The loop has no verdict of its own: failures surface only through the
/// per-query error and duration metrics.
pub struct QueryLoop {
    probe: NamedQueryProbe,
    queries: Arc<[QuerySpec]>,
    initial_delay: Duration,
}

impl QueryLoop {
    pub fn new(probe: NamedQueryProbe, queries: Arc<[QuerySpec]>, initial_delay: Duration) -> Self {
        Self {
            probe,
            queries,
            initial_delay,
        }
    }

    /// Sweep until `shutdown` fires. Shutdown is checked before every sweep
    /// and before every query, and abandons a query in flight.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!("waiting for initial delay before querying specified queries");
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = tokio::time::sleep(self.initial_delay) => {}
        }

        if self.queries.is_empty() {
            info!("no queries configured, idling until shutdown");
            shutdown.cancelled().await;
            return Ok(());
        }

        info!(queries = self.queries.len(), "start querying for specified queries");

        let mut sweeps: u64 = 0;
        while !shutdown.is_cancelled() {
            for spec in self.queries.iter() {
                if shutdown.is_cancelled() {
                    break;
                }
                self.probe.run(spec, &shutdown).await;
            }
            sweeps += 1;
            // Let other tasks run even if every query completed without
            // suspending.
            tokio::task::yield_now().await;
        }

        info!(sweeps, "stopped querying for specified queries");
        Ok(())
    }
}

//! Core Probe trait

use async_trait::async_trait;

use crate::Result;
use crate::counters::ProbeKind;

/// A single self-contained check against the monitored system.
///
/// One call to [`execute`](Probe::execute) builds a request, sends it and
/// interprets the response. Any transport, status or response-shape problem
/// is returned as an error; the caller classifies it as an error outcome.
/// Implementations must be cancel-safe: the periodic runner drops the
/// future when the execution's deadline passes.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Counter key for this probe's outcomes.
    fn kind(&self) -> ProbeKind;

    /// Run the check once.
    async fn execute(&self) -> Result<()>;
}

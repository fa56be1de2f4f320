//! Success-ratio verdicts.

use tracing::{error, info};

use crate::counters::Tally;
use crate::{Result, UpError};

/// Ratio of successes to all outcomes, or `None` when nothing was recorded.
pub fn success_ratio(tally: Tally) -> Option<f64> {
    match tally.total() {
        0 => None,
        total => Some(tally.successes as f64 / total as f64),
    }
}

/// Turn a final tally into a pass/fail verdict.
///
/// Passes when the success ratio is at least `threshold`. A tally with no
/// outcomes at all fails regardless of the threshold, reported as a 0%
/// ratio.
pub fn evaluate(tally: Tally, threshold: f64) -> Result<()> {
    info!(
        success = tally.successes,
        errors = tally.errors,
        "number of requests"
    );

    match success_ratio(tally) {
        Some(ratio) if ratio >= threshold => Ok(()),
        ratio => {
            let ratio = ratio.unwrap_or(0.0);
            error!(ratio, threshold, "ratio is below threshold");
            Err(UpError::ThresholdNotMet { threshold, ratio })
        }
    }
}

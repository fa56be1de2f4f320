//! Error types for the probe.

/// Errors raised while configuring or running probes.
///
/// Probe executions classify these into error outcomes and keep going;
/// only configuration errors, failed verdicts and task failures reach the
/// process exit code.
#[derive(Debug, thiserror::Error)]
pub enum UpError {
    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("non-success status ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("query API error ({error_type}): {message}")]
    QueryApi { error_type: String, message: String },

    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    #[error("cancelled")]
    Cancelled,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Response shape errors
    #[error("unexpected query result: {0}")]
    UnexpectedResult(String),

    #[error("expected one metric, got {0}")]
    Cardinality(usize),

    #[error("metric value is too old: {age_secs:.0}s")]
    StaleSample { age_secs: f64 },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid label {label:?}: {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("query {name:?} is invalid: {reason}")]
    InvalidQuery { name: String, reason: String },

    // Terminal errors
    #[error("failed with less than {:.0}% success ratio - actual {:.0}%", .threshold * 100.0, .ratio * 100.0)]
    ThresholdNotMet { threshold: f64, ratio: f64 },

    #[error("task {name} failed: {reason}")]
    Task { name: String, reason: String },
}

impl From<reqwest::Error> for UpError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            UpError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            UpError::Http(err.to_string())
        }
    }
}

/// Result type alias for probe operations
pub type Result<T> = std::result::Result<T, UpError>;

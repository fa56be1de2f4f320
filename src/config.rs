//! Command-line configuration.
//!
//! [`Flags`] is the raw clap surface; [`Options::from_flags`] validates it
//! and produces the frozen configuration the probes run with. Nothing is
//! probed until every option has been accepted.
//!
//! The queries file is YAML:
//!
//! ```yaml
//! queries:
//!   - name: ingested-samples
//!     query: sum(rate(prometheus_tsdb_head_samples_appended_total[5m]))
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use reqwest::Url;
use serde::Deserialize;
use tracing::info;

use crate::labels::LabelSet;
use crate::probe::QuerySpec;
use crate::token::{self, TokenProvider};
use crate::{Result, UpError};

/// Log filtering level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write a marker series and read it back to judge the pipeline.
#[derive(Debug, Clone, Parser)]
#[command(name = "up")]
#[command(version = crate::version::PKG_VERSION)]
#[command(about = "Synthetic probe for remote-write and query endpoints")]
pub struct Flags {
    /// The log filtering level.
    #[arg(long = "log.level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// The endpoint to which to make remote-write requests.
    #[arg(long = "endpoint-write")]
    pub endpoint_write: Option<String>,

    /// The endpoint to which to make query requests.
    #[arg(long = "endpoint-read")]
    pub endpoint_read: Option<String>,

    /// Labels in addition to '__name__' applied to remote-write requests,
    /// as name="value" pairs separated by commas.
    #[arg(long)]
    pub labels: Option<String>,

    /// The address on which the metrics server listens.
    #[arg(long, default_value = ":8080")]
    pub listen: String,

    /// The name of the metric to send in remote-write requests.
    #[arg(long, default_value = "up")]
    pub name: String,

    /// The bearer token to send with requests. Takes precedence over --token-file.
    #[arg(long, env = "UP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// A file to read the bearer token from, re-read on every request.
    #[arg(long = "token-file")]
    pub token_file: Option<PathBuf>,

    /// A YAML file with queries to run against the read endpoint.
    #[arg(long = "queries-file")]
    pub queries_file: Option<PathBuf>,

    /// The time to wait between remote-write requests.
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub period: Duration,

    /// How long to run before stopping. 0 runs until the process is terminated.
    #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// The fraction of successful requests needed to succeed overall, 0 - 1.
    #[arg(long, default_value_t = 0.9)]
    pub threshold: f64,

    /// The maximum allowable latency between writing and reading.
    #[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
    pub latency: Duration,

    /// The time to wait before executing the first query.
    #[arg(long = "initial-query-delay", default_value = "5s", value_parser = humantime::parse_duration)]
    pub initial_query_delay: Duration,
}

/// Validated, immutable probe configuration.
#[derive(Debug, Clone)]
pub struct Options {
    pub log_level: LogLevel,
    pub write_endpoint: Option<Url>,
    pub read_endpoint: Option<Url>,
    /// Configured labels followed by `__name__`.
    pub labels: Arc<LabelSet>,
    pub listen: SocketAddr,
    pub token: Arc<dyn TokenProvider>,
    /// `Some` when a queries file was given, even if it lists no queries.
    pub queries: Option<Arc<[QuerySpec]>>,
    pub period: Duration,
    /// `None` runs until interrupted.
    pub duration: Option<Duration>,
    pub latency: Duration,
    pub initial_query_delay: Duration,
    pub success_threshold: f64,
}

impl Options {
    /// Validate `flags` into options.
    pub fn from_flags(flags: Flags) -> Result<Self> {
        let write_endpoint = parse_endpoint("--endpoint-write", flags.endpoint_write.as_deref())?;
        if write_endpoint.is_none() {
            info!("no write endpoint specified, no write tests being performed");
        }
        let read_endpoint = parse_endpoint("--endpoint-read", flags.endpoint_read.as_deref())?;
        if read_endpoint.is_none() {
            info!("no read endpoint specified, no read tests being performed");
        }

        let queries = flags
            .queries_file
            .as_deref()
            .map(load_queries)
            .transpose()?
            .map(Arc::from);

        if flags.period.is_zero() {
            return Err(UpError::Configuration("--period must be positive".into()));
        }
        if flags.latency <= flags.period {
            return Err(UpError::Configuration(
                "--latency cannot be less than period".into(),
            ));
        }
        if !(0.0..=1.0).contains(&flags.threshold) {
            return Err(UpError::Configuration(format!(
                "--threshold must be between 0 and 1, got {}",
                flags.threshold
            )));
        }

        let labels = LabelSet::parse(flags.labels.as_deref().unwrap_or_default())?
            .with_metric_name(&flags.name);

        Ok(Self {
            log_level: flags.log_level,
            write_endpoint,
            read_endpoint,
            labels: Arc::new(labels),
            listen: parse_listen(&flags.listen)?,
            token: token::provider(flags.token.as_deref(), flags.token_file),
            queries,
            period: flags.period,
            duration: (!flags.duration.is_zero()).then_some(flags.duration),
            latency: flags.latency,
            initial_query_delay: flags.initial_query_delay,
            success_threshold: flags.threshold,
        })
    }
}

fn parse_endpoint(flag: &str, raw: Option<&str>) -> Result<Option<Url>> {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    let url = Url::parse(raw)
        .map_err(|e| UpError::Configuration(format!("{flag} is invalid: {e}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(UpError::Configuration(format!(
            "{flag} is invalid: expected an http(s) URL, got {raw:?}"
        )));
    }
    Ok(Some(url))
}

/// Accept `host:port` and the port-only `:port` shorthand.
fn parse_listen(raw: &str) -> Result<SocketAddr> {
    let full = if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    };
    full.parse()
        .map_err(|e| UpError::Configuration(format!("--listen {raw:?} is invalid: {e}")))
}

#[derive(Debug, Deserialize)]
struct QueriesFile {
    #[serde(default)]
    queries: Vec<QuerySpec>,
}

/// Load and validate the queries file. Every query must parse as PromQL.
pub fn load_queries(path: &Path) -> Result<Vec<QuerySpec>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        UpError::Configuration(format!("--queries-file {path:?} is invalid: {e}"))
    })?;
    let file: QueriesFile = serde_yaml::from_str(&content).map_err(|e| {
        UpError::Configuration(format!("--queries-file {path:?} content is invalid: {e}"))
    })?;

    for spec in &file.queries {
        validate_query(spec)?;
    }

    info!(
        count = file.queries.len(),
        "queries configured to be queried periodically"
    );
    Ok(file.queries)
}

/// Reject queries that are not syntactically valid PromQL.
pub fn validate_query(spec: &QuerySpec) -> Result<()> {
    promql_parser::parser::parse(&spec.query)
        .map(|_| ())
        .map_err(|reason| UpError::InvalidQuery {
            name: spec.name.clone(),
            reason,
        })
}

//! up - synthetic monitoring probe for metrics pipelines
//!
//! Periodically writes a marker series to a remote-write endpoint and reads
//! it back through a Prometheus-compatible query API. A list of named
//! queries can be swept alongside. Outcomes are tallied per probe and turned into a
//! pass/fail verdict against a success-ratio threshold when the run ends.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tokio_util::sync::CancellationToken;
//! use up::client::{RemoteWriteClient, http_client};
//! use up::token::NoOpToken;
//! use up::{LabelSet, OutcomeCounters, PeriodicRunner, WriteProbe};
//!
//! #[tokio::main]
//! async fn main() -> up::Result<()> {
//!     let labels = Arc::new(LabelSet::default().with_metric_name("up"));
//!     let client = RemoteWriteClient::new(
//!         http_client()?,
//!         "http://localhost:19291/api/v1/receive".parse().unwrap(),
//!         Arc::new(NoOpToken),
//!     );
//!     let probe = Arc::new(WriteProbe::new(client, labels));
//!
//!     let shutdown = CancellationToken::new();
//!     let stop = shutdown.clone();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_secs(60)).await;
//!         stop.cancel();
//!     });
//!
//!     PeriodicRunner::new(Duration::from_secs(5), 0.9, OutcomeCounters::new())
//!         .run(probe, shutdown)
//!         .await
//! }
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod counters;
pub mod error;
pub mod labels;
pub mod probe;
pub mod runner;
pub mod supervisor;
pub mod telemetry;
pub mod token;
pub mod traits;
pub mod verdict;
pub mod version;

// Re-export main types at crate root
pub use config::{Flags, Options};
pub use counters::{Outcome, OutcomeCounters, ProbeKind, Tally};
pub use error::{Result, UpError};
pub use labels::{Label, LabelSet};
pub use probe::{NamedQueryProbe, QuerySpec, ReadProbe, WriteProbe};
pub use runner::{PeriodicRunner, QueryLoop};
pub use supervisor::Supervisor;
pub use token::TokenProvider;
pub use traits::Probe;
pub use version::{PKG_VERSION, version_string};

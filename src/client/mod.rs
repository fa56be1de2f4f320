//! HTTP clients for the monitored endpoints.
//!
//! [`RemoteWriteClient`] pushes snappy-compressed protobuf write requests;
//! [`QueryClient`] runs instant queries against a Prometheus-compatible
//! query API. Both attach the bearer token from a
//! [`TokenProvider`](crate::token::TokenProvider) to every request.

pub mod query;
pub mod remote_write;

pub use query::{QueryClient, QueryExecutor, QueryResponse, QueryValue, SamplePair, VectorSample};
pub use remote_write::{RemoteWriteClient, WriteRequest};

use reqwest::Client;

use crate::{Result, UpError};

/// Build the HTTP client shared by all probes.
///
/// No client-level timeout is set: each probe execution is bounded by its
/// own deadline instead.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(format!("up/{}", crate::version::PKG_VERSION))
        .build()
        .map_err(|e| UpError::Configuration(format!("failed to build HTTP client: {e}")))
}

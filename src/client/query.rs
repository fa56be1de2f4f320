//! Instant-query client for the Prometheus HTTP API.
//!
//! Queries are POSTed as an urlencoded form. Servers that reject POST with
//! `405 Method Not Allowed` are retried once with a GET carrying the same
//! parameters.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;

use crate::token::{self, TokenProvider};
use crate::{Result, UpError};

/// Response header carrying the Thanos trace id, when present.
pub const TRACE_ID_HEADER: &str = "X-Thanos-Trace-Id";

/// Path of the instant-query API below a server root.
pub const INSTANT_QUERY_PATH: &str = "/api/v1/query";

// =============================================================================
// Response types
// =============================================================================

/// A `[<unix seconds>, "<value>"]` pair as returned by the query API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SamplePair(pub f64, pub String);

impl SamplePair {
    /// Evaluation timestamp in Unix seconds.
    pub fn timestamp(&self) -> f64 {
        self.0
    }

    /// Sample value parsed as a float (`NaN`, `+Inf` and `-Inf` included).
    pub fn value(&self) -> Result<f64> {
        self.1
            .parse()
            .map_err(|_| UpError::UnexpectedResult(format!("invalid sample value {:?}", self.1)))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorSample {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub value: SamplePair,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatrixSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<SamplePair>,
}

/// Typed query result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryValue {
    Scalar(SamplePair),
    String(SamplePair),
    Vector(Vec<VectorSample>),
    Matrix(Vec<MatrixSeries>),
}

impl QueryValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryValue::Scalar(_) => "scalar",
            QueryValue::String(_) => "string",
            QueryValue::Vector(_) => "vector",
            QueryValue::Matrix(_) => "matrix",
        }
    }

    /// Number of series (or 1 for scalars and strings).
    pub fn len(&self) -> usize {
        match self {
            QueryValue::Scalar(_) | QueryValue::String(_) => 1,
            QueryValue::Vector(v) => v.len(),
            QueryValue::Matrix(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Option<QueryValue>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// A decoded instant-query response.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub value: QueryValue,
    pub warnings: Vec<String>,
    pub trace_id: Option<String>,
}

fn decode(status: StatusCode, body: &str, trace_id: Option<String>) -> Result<QueryResponse> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(UpError::Api {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if envelope.status != "success" {
        return Err(UpError::QueryApi {
            error_type: envelope.error_type.unwrap_or_else(|| status.to_string()),
            message: envelope.error.unwrap_or_default(),
        });
    }
    if !status.is_success() {
        return Err(UpError::Api {
            status: status.as_u16(),
            message: "query API reported success with a non-2xx status".into(),
        });
    }

    let value = envelope
        .data
        .ok_or_else(|| UpError::UnexpectedResult("response has no data".into()))?;

    Ok(QueryResponse {
        value,
        warnings: envelope.warnings,
        trace_id,
    })
}

/// Format `at` as fractional Unix seconds, the form the query API expects.
pub fn format_time(at: SystemTime) -> String {
    let since = at.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:03}", since.as_secs(), since.subsec_millis())
}

// =============================================================================
// Client
// =============================================================================

/// Runs instant queries. Implemented by [`QueryClient`] and by test doubles.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Evaluate `query` at `at`, or at the server's current time when `None`.
    async fn instant(&self, query: &str, at: Option<SystemTime>) -> Result<QueryResponse>;
}

/// Instant-query client bound to one endpoint.
#[derive(Clone)]
pub struct QueryClient {
    http: Client,
    endpoint: Url,
    token: Arc<dyn TokenProvider>,
}

impl QueryClient {
    /// Query `endpoint` exactly as given.
    pub fn new(http: Client, endpoint: Url, token: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            endpoint,
            token,
        }
    }

    /// Query the instant-query API at the root of `endpoint`'s server,
    /// whatever path `endpoint` carries.
    pub fn at_api_root(http: Client, mut endpoint: Url, token: Arc<dyn TokenProvider>) -> Self {
        endpoint.set_path(INSTANT_QUERY_PATH);
        endpoint.set_query(None);
        Self::new(http, endpoint, token)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match token::bearer(self.token.as_ref())? {
            Some(auth) => builder.header(AUTHORIZATION, auth),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        self.authorize(builder)?
            .send()
            .await
            .map_err(|e| UpError::Http(format!("query request failed: {e}")))
    }
}

#[async_trait]
impl QueryExecutor for QueryClient {
    async fn instant(&self, query: &str, at: Option<SystemTime>) -> Result<QueryResponse> {
        let mut params = vec![("query", query.to_string())];
        if let Some(at) = at {
            params.push(("time", format_time(at)));
        }

        let mut response = self
            .send(self.http.post(self.endpoint.clone()).form(&params))
            .await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            response = self
                .send(self.http.get(self.endpoint.clone()).query(&params))
                .await?;
        }

        let status = response.status();
        let trace_id = response
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| UpError::Http(format!("reading query response: {e}")))?;

        decode(status, &body, trace_id)
    }
}

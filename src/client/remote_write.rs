//! Remote-write client.
//!
//! Requests are protobuf `WriteRequest` messages compressed with block
//! snappy, as expected by Prometheus-compatible remote-write receivers.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, Url};

use crate::labels::LabelSet;
use crate::token::{self, TokenProvider};
use crate::{Result, UpError};

const REMOTE_WRITE_VERSION_HEADER: &str = "X-Prometheus-Remote-Write-Version";
const REMOTE_WRITE_VERSION: &str = "0.1.0";

// =============================================================================
// Wire types
// =============================================================================

/// A batch of time series to write.
#[derive(Clone, PartialEq, Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

impl WriteRequest {
    /// A single-sample series whose value and timestamp are both `at` in
    /// Unix milliseconds, so a reader can compute the sample's age from its
    /// value alone.
    pub fn marker(labels: &LabelSet, at: SystemTime) -> Self {
        let millis = unix_millis(at);
        Self {
            timeseries: vec![TimeSeries {
                labels: labels
                    .iter()
                    .map(|l| Label {
                        name: l.name.clone(),
                        value: l.value.clone(),
                    })
                    .collect(),
                samples: vec![Sample {
                    value: millis as f64,
                    timestamp: millis,
                }],
            }],
        }
    }

    /// Protobuf-encode and snappy-compress the request.
    pub fn encode_compressed(&self) -> Result<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(&self.encode_to_vec())
            .map_err(|e| UpError::Encoding(format!("snappy compression failed: {e}")))
    }
}

/// Milliseconds since the Unix epoch; times before the epoch clamp to zero.
pub fn unix_millis(at: SystemTime) -> i64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// =============================================================================
// Client
// =============================================================================

/// Sends write requests to a remote-write endpoint.
#[derive(Clone)]
pub struct RemoteWriteClient {
    http: Client,
    endpoint: Url,
    token: Arc<dyn TokenProvider>,
}

impl RemoteWriteClient {
    pub fn new(http: Client, endpoint: Url, token: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            endpoint,
            token,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send `request`; anything but a 2xx response is an error.
    pub async fn write(&self, request: &WriteRequest) -> Result<()> {
        let body = request.encode_compressed()?;

        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_ENCODING, "snappy")
            .header(CONTENT_TYPE, "application/x-protobuf")
            .header(REMOTE_WRITE_VERSION_HEADER, REMOTE_WRITE_VERSION)
            .body(body);
        if let Some(auth) = token::bearer(self.token.as_ref())? {
            builder = builder.header(AUTHORIZATION, auth);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| UpError::Http(format!("making request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpError::Api {
                status: status.as_u16(),
                message: format!("non-2xx status {status}: {}", message.trim()),
            });
        }

        Ok(())
    }
}

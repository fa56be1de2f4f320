//! Write probe: push the marker sample.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::Result;
use crate::client::{RemoteWriteClient, WriteRequest};
use crate::counters::ProbeKind;
use crate::labels::LabelSet;
use crate::traits::Probe;

/// Writes one sample whose value is the current time in milliseconds.
pub struct WriteProbe {
    client: RemoteWriteClient,
    labels: Arc<LabelSet>,
}

impl WriteProbe {
    pub fn new(client: RemoteWriteClient, labels: Arc<LabelSet>) -> Self {
        Self { client, labels }
    }
}

#[async_trait]
impl Probe for WriteProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Write
    }

    async fn execute(&self) -> Result<()> {
        let request = WriteRequest::marker(&self.labels, SystemTime::now());
        self.client.write(&request).await
    }
}

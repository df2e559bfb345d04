use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::table::RowRecord;

/// The finalized payload handed to the upload endpoint. Built only once a
/// table is held and both periods are selected; dropped as soon as the
/// upload attempt resolves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEnvelope {
    pub source_id: String,
    pub source_label: String,
    pub from_period_id: String,
    pub to_period_id: String,
    pub file_name: String,
    pub row_count: usize,
    pub rows: Vec<RowRecord>,
}

/// Where finished envelopes go. The concrete path/verb is owned by the
/// surrounding application; sessions only need something that can accept
/// an envelope or fail.
#[allow(async_fn_in_trait)]
pub trait UploadSink {
    async fn upload(&self, envelope: &UploadEnvelope) -> Result<()>;
}

/// POSTs envelopes as JSON. Carries its own request timeout so a stuck
/// upload resolves instead of hanging the session.
#[derive(Clone)]
pub struct HttpUploadSink {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpUploadSink {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl UploadSink for HttpUploadSink {
    async fn upload(&self, envelope: &UploadEnvelope) -> Result<()> {
        debug!(rows = envelope.row_count, endpoint = %self.endpoint, "posting envelope");
        self.client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(envelope)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("non-success status from {}", self.endpoint))?;
        Ok(())
    }
}

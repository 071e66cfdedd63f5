//! Delivery client seams.
//!
//! The transports never talk to the network themselves; they publish through
//! the narrow [`StreamClient`]/[`QueueClient`] traits. A [`SinkSession`]
//! hands out configured clients — the production implementation is an HTTP
//! relay speaking JSON batches, and tests substitute in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::DeliveryError;

// ─── Wire records ────────────────────────────────────────────────────────────

/// One record of a stream batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub data: serde_json::Value,
    /// Shard routing key — the repository identity, so per-repo ordering
    /// holds within a shard.
    pub partition_key: String,
}

/// One entry of a queue batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub id: String,
    /// Redelivery of an identical change dedups on this key.
    pub message_deduplication_id: String,
    /// FIFO ordering group — the repository identity.
    pub message_group_id: String,
    pub message_body: serde_json::Value,
}

// ─── Client traits ───────────────────────────────────────────────────────────

/// Publish a batch of records to a sharded append log.
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn put_records(
        &self,
        stream: &str,
        records: &[StreamRecord],
    ) -> Result<(), DeliveryError>;
}

/// Publish a batch of messages to a FIFO queue.
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: &[QueueMessage],
    ) -> Result<(), DeliveryError>;
}

/// Credentials/session collaborator: resolves regions to configured clients.
/// Constructed by the caller, never by the core.
pub trait SinkSession: Send + Sync {
    fn stream_client(&self, region: &str) -> Arc<dyn StreamClient>;
    fn queue_client(&self, region: &str) -> Arc<dyn QueueClient>;
}

// ─── HTTP relay production clients ───────────────────────────────────────────

/// Session backed by the batch relay endpoint.
pub struct RelaySession {
    base_url: String,
    token: Option<String>,
    assume_role: Option<String>,
    http: reqwest::Client,
}

impl RelaySession {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        assume_role: Option<String>,
    ) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeliveryError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            assume_role,
            http,
        })
    }

    fn client_for(&self, region: &str) -> RelayClient {
        RelayClient {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            assume_role: self.assume_role.clone(),
            region: region.to_string(),
            http: self.http.clone(),
        }
    }
}

impl SinkSession for RelaySession {
    fn stream_client(&self, region: &str) -> Arc<dyn StreamClient> {
        Arc::new(self.client_for(region))
    }

    fn queue_client(&self, region: &str) -> Arc<dyn QueueClient> {
        Arc::new(self.client_for(region))
    }
}

/// One region-bound relay client.
pub struct RelayClient {
    base_url: String,
    token: Option<String>,
    assume_role: Option<String>,
    region: String,
    http: reqwest::Client,
}

impl RelayClient {
    async fn post(&self, path: &str, payload: serde_json::Value) -> Result<(), DeliveryError> {
        let url = format!("{}/{path}", self.base_url);
        let mut request = self.http.post(&url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(%url, "batch delivered");
            return Ok(());
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DeliveryError::Throttled(format!("{url} returned {status}")));
        }
        Err(DeliveryError::Rejected(format!("{url} returned {status}")))
    }
}

#[async_trait]
impl StreamClient for RelayClient {
    async fn put_records(
        &self,
        stream: &str,
        records: &[StreamRecord],
    ) -> Result<(), DeliveryError> {
        self.post(
            "streams/put-records",
            json!({
                "region": self.region,
                "assumeRole": self.assume_role,
                "stream": stream,
                "records": records,
            }),
        )
        .await
    }
}

#[async_trait]
impl QueueClient for RelayClient {
    async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: &[QueueMessage],
    ) -> Result<(), DeliveryError> {
        self.post(
            "queues/send-message-batch",
            json!({
                "region": self.region,
                "assumeRole": self.assume_role,
                "queueUrl": queue_url,
                "entries": entries,
            }),
        )
        .await
    }
}

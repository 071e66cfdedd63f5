//! Rate-limited stream sink (sharded append log).
//!
//! Batches up to [`STREAM_BATCH_SIZE`] changes. A flush publishes the whole
//! batch; a throughput-exceeded rejection retries the identical batch with
//! capped exponential backoff, and the buffer is cleared only after the
//! batch lands — a partial batch is never silently dropped.

use std::sync::Arc;

use async_trait::async_trait;

use crate::policy::PolicyChange;
use crate::retry::{retry_if, RetryConfig};

use super::client::{StreamClient, StreamRecord};
use super::{DeliveryError, Transport};

pub const STREAM_BATCH_SIZE: usize = 50;

pub struct StreamTransport {
    client: Arc<dyn StreamClient>,
    stream_name: String,
    buf: Vec<PolicyChange>,
    retry: RetryConfig,
}

impl StreamTransport {
    pub fn new(client: Arc<dyn StreamClient>, stream_name: impl Into<String>) -> Self {
        Self {
            client,
            stream_name: stream_name.into(),
            buf: Vec::new(),
            retry: RetryConfig::default(),
        }
    }

    /// Override the backoff schedule (tests).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send(&mut self, change: PolicyChange) -> Result<(), DeliveryError> {
        self.buf.push(change);
        if self.buf.len() >= STREAM_BATCH_SIZE {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), DeliveryError> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let records: Vec<StreamRecord> = self
            .buf
            .iter()
            .map(|change| StreamRecord {
                data: change.data(),
                partition_key: change.repo_uri.clone(),
            })
            .collect();

        let client = &self.client;
        let stream_name = &self.stream_name;
        retry_if(&self.retry, DeliveryError::is_retryable, || {
            client.put_records(stream_name, &records)
        })
        .await?;

        // The batch landed as a whole; only now does the buffer clear.
        self.buf.clear();
        Ok(())
    }
}

//! FIFO queue sink.
//!
//! Batches up to [`QUEUE_BATCH_SIZE`] changes. Each message derives its
//! deduplication key from `(commit id, policy name)` and its group key from
//! the repository identity, so redelivery of an identical change is dropped
//! by the queue and per-repository ordering is preserved.

use std::sync::Arc;

use async_trait::async_trait;

use crate::policy::PolicyChange;

use super::client::{QueueClient, QueueMessage};
use super::{DeliveryError, Transport};

pub const QUEUE_BATCH_SIZE: usize = 10;

pub struct QueueTransport {
    client: Arc<dyn QueueClient>,
    queue_url: String,
    buf: Vec<PolicyChange>,
}

impl QueueTransport {
    pub fn new(client: Arc<dyn QueueClient>, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            buf: Vec::new(),
        }
    }
}

#[async_trait]
impl Transport for QueueTransport {
    async fn send(&mut self, change: PolicyChange) -> Result<(), DeliveryError> {
        self.buf.push(change);
        if self.buf.len() >= QUEUE_BATCH_SIZE {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), DeliveryError> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let entries: Vec<QueueMessage> = self
            .buf
            .iter()
            .map(|change| {
                let key = format!("{}{}", change.commit.id, change.policy.name);
                QueueMessage {
                    id: key.clone(),
                    message_deduplication_id: key,
                    message_group_id: change.repo_uri.clone(),
                    message_body: change.data(),
                }
            })
            .collect();

        self.client
            .send_message_batch(&self.queue_url, &entries)
            .await?;
        self.buf.clear();
        Ok(())
    }
}

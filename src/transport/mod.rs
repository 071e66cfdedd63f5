// SPDX-License-Identifier: MIT
//! Change delivery.
//!
//! A [`Transport`] buffers outgoing changes and flushes automatically when
//! its backend's batch size is reached, so a caller only needs to `close()`
//! at the end of a walk to guarantee delivery of any remainder. Backends:
//!
//! - **console** — batch size 1, text or indented JSON
//! - **stream** — batch size 50, all-or-retry with capped backoff
//! - **queue** — batch size 10, dedup/group keys per message
//!
//! [`resolve`] maps a sink identifier to a concrete backend once, at
//! startup; the walk never inspects the identifier again.

pub mod client;
pub mod console;
pub mod queue;
pub mod stream;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::arn::Arn;
use crate::policy::PolicyChange;

pub use client::{QueueClient, RelaySession, SinkSession, StreamClient};
pub use console::{ConsoleTransport, OutputFormat};
pub use queue::{QueueTransport, QUEUE_BATCH_SIZE};
pub use stream::{StreamTransport, STREAM_BATCH_SIZE};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Why a sink did not accept a batch.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Rate-limiting-class rejection; the identical batch may be retried.
    #[error("throughput exceeded: {0}")]
    Throttled(String),
    /// Permanent rejection (bad credentials, invalid destination). Fatal —
    /// aborting beats silently dropping changes.
    #[error("delivery rejected: {0}")]
    Rejected(String),
    #[error("network failure: {0}")]
    Network(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Throttled(_))
    }
}

// ─── Transport contract ──────────────────────────────────────────────────────

/// A buffered change sink.
#[async_trait]
pub trait Transport: Send {
    /// Queue one change, flushing automatically once the backend's batch
    /// size is reached.
    async fn send(&mut self, change: PolicyChange) -> Result<(), DeliveryError>;

    /// Deliver all queued changes and clear the buffer.
    async fn flush(&mut self) -> Result<(), DeliveryError>;

    /// Flush, then release resources.
    async fn close(&mut self) -> Result<(), DeliveryError> {
        self.flush().await
    }
}

// ─── Sink resolution ─────────────────────────────────────────────────────────

/// Resolve a sink identifier to a concrete transport.
///
/// `stdout` and `json` render locally; an ARN selects the stream or queue
/// backend, with clients supplied by the given session.
pub fn resolve(stream_uri: &str, session: &dyn SinkSession) -> Result<Box<dyn Transport>> {
    match stream_uri {
        "stdout" => Ok(Box::new(ConsoleTransport::new(OutputFormat::Text))),
        "json" => Ok(Box::new(ConsoleTransport::new(OutputFormat::Json))),
        uri if uri.starts_with("arn") => {
            let arn: Arn = uri.parse()?;
            match arn.service.as_str() {
                "kinesis" => Ok(Box::new(StreamTransport::new(
                    session.stream_client(&arn.region),
                    arn.resource,
                ))),
                "sqs" => {
                    let queue_url = format!(
                        "https://sqs.{}.amazonaws.com/{}/{}",
                        arn.region, arn.account, arn.resource
                    );
                    Ok(Box::new(QueueTransport::new(
                        session.queue_client(&arn.region),
                        queue_url,
                    )))
                }
                other => bail!("unsupported transport service: {other}"),
            }
        }
        other => bail!("invalid transport: {other}"),
    }
}

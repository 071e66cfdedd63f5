//! Console sink — every change is written immediately (batch size 1).

use async_trait::async_trait;

use crate::policy::PolicyChange;

use super::{DeliveryError, Transport};

/// How changes are rendered on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One-line description per change.
    Text,
    /// Indented structured payload per change.
    Json,
}

pub struct ConsoleTransport {
    format: OutputFormat,
}

impl ConsoleTransport {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&mut self, change: PolicyChange) -> Result<(), DeliveryError> {
        match self.format {
            OutputFormat::Text => println!("{change}"),
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&change.data()).unwrap_or_default()
            ),
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), DeliveryError> {
        Ok(())
    }
}

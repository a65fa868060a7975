//! Outbound message broker abstraction.

#[cfg(feature = "kafka")]
mod kafka;

#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Deployment;

/// Where a message is delivered: the broker profile and its topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerTarget {
    pub deployment: Deployment,
    pub topic: String,
}

/// Acknowledgement returned once the broker has stored the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Delivery was attempted and the broker reported an error.
    #[error("{0}")]
    Delivery(String),
    /// The producer could not be created or the message could not be queued.
    #[error("{0}")]
    Unavailable(String),
}

/// Single-attempt delivery of a serialized message.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn deliver(
        &self,
        target: &BrokerTarget,
        payload: &str,
    ) -> Result<DeliveryReceipt, BrokerError>;
}

use async_trait::async_trait;
use gci_dx::config::BrokerRouting;
use gci_dx::messaging::{BrokerError, BrokerTarget, DeliveryReceipt, MessageBroker};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Broker used when the service is built without the `kafka` feature. No
/// transport is available, so every delivery is refused.
#[cfg_attr(feature = "kafka", allow(dead_code))]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DisconnectedBroker;

#[async_trait]
impl MessageBroker for DisconnectedBroker {
    async fn deliver(
        &self,
        target: &BrokerTarget,
        _payload: &str,
    ) -> Result<DeliveryReceipt, BrokerError> {
        Err(BrokerError::Unavailable(format!(
            "no broker transport for topic {}; build with the kafka feature",
            target.topic
        )))
    }
}

#[cfg(feature = "kafka")]
pub(crate) type ServiceBroker = gci_dx::messaging::KafkaBroker;

#[cfg(not(feature = "kafka"))]
pub(crate) type ServiceBroker = DisconnectedBroker;

#[cfg(feature = "kafka")]
pub(crate) fn service_broker(routing: &BrokerRouting) -> ServiceBroker {
    gci_dx::messaging::KafkaBroker::new(routing.clone())
}

#[cfg(not(feature = "kafka"))]
pub(crate) fn service_broker(routing: &BrokerRouting) -> ServiceBroker {
    tracing::warn!(
        local_topic = %routing.local.topic,
        "built without the kafka feature; every publish will fail delivery"
    );
    DisconnectedBroker
}

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, info};

use super::{BrokerError, BrokerTarget, DeliveryReceipt, MessageBroker};
use crate::config::{BrokerProfile, BrokerRouting, Deployment};

/// Kafka transport with one TLS producer per deployment, created on first use.
pub struct KafkaBroker {
    routing: BrokerRouting,
    producers: Mutex<HashMap<Deployment, FutureProducer>>,
}

impl KafkaBroker {
    pub fn new(routing: BrokerRouting) -> Self {
        Self {
            routing,
            producers: Mutex::new(HashMap::new()),
        }
    }

    fn producer(&self, deployment: Deployment) -> Result<FutureProducer, BrokerError> {
        let mut producers = self
            .producers
            .lock()
            .map_err(|_| BrokerError::Unavailable("producer cache poisoned".to_string()))?;

        if let Some(producer) = producers.get(&deployment) {
            return Ok(producer.clone());
        }

        let profile = self.routing.profile(deployment);
        let producer: FutureProducer = client_config(profile)
            .create()
            .map_err(|err| BrokerError::Unavailable(err.to_string()))?;
        info!(
            deployment = deployment.label(),
            bootstrap = %profile.bootstrap_servers,
            "created kafka producer"
        );
        producers.insert(deployment, producer.clone());
        Ok(producer)
    }
}

fn client_config(profile: &BrokerProfile) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &profile.bootstrap_servers)
        .set("security.protocol", "ssl")
        .set("ssl.key.location", profile.tls.key.to_string_lossy())
        .set("ssl.key.password", &profile.key_password)
        .set("ssl.certificate.location", profile.tls.certificate.to_string_lossy())
        .set("ssl.ca.location", profile.tls.ca.to_string_lossy());
    config
}

#[async_trait]
impl MessageBroker for KafkaBroker {
    async fn deliver(
        &self,
        target: &BrokerTarget,
        payload: &str,
    ) -> Result<DeliveryReceipt, BrokerError> {
        let producer = self.producer(target.deployment)?;
        let record = FutureRecord::<(), str>::to(&target.topic).payload(payload);

        debug!(topic = %target.topic, bytes = payload.len(), "producing message");
        let (partition, offset) = producer
            .send(record, Duration::from_secs(0))
            .await
            .map_err(|(err, _)| BrokerError::Delivery(err.to_string()))?;

        Ok(DeliveryReceipt { partition, offset })
    }
}

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tracing::debug;

use crate::common::{DomainError, DomainResult};
use crate::config::KafkaConfig;
use crate::domains::path_planning::ExecutionChannel;

pub fn create_producer(config: &KafkaConfig) -> DomainResult<FutureProducer> {
    ClientConfig::new()
        .set("bootstrap.servers", config.brokers.join(","))
        .set("client.id", &config.client_id)
        .set("message.timeout.ms", "5000")
        .create()
        .map_err(|e| DomainError::InfrastructureError(format!("Failed to create Kafka producer: {}", e)))
}

/// Publishes dispatched plans to the robot-path topic.
pub struct KafkaExecutionChannel {
    producer: FutureProducer,
    topic: String,
}

impl KafkaExecutionChannel {
    pub fn new(config: &KafkaConfig) -> DomainResult<Self> {
        Ok(Self::with_producer(create_producer(config)?, config.topics.robot_path.clone()))
    }

    pub fn with_producer(producer: FutureProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl ExecutionChannel for KafkaExecutionChannel {
    async fn publish(&self, key: &str, payload: &[u8]) -> DomainResult<()> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        let (partition, offset) = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| DomainError::InfrastructureError(format!("Failed to send plan to Kafka: {}", e)))?;

        debug!(topic = %self.topic, key, partition, offset, "plan published");
        Ok(())
    }
}

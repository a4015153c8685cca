use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::command::{CommandHandler, PlanReply};
use crate::common::{DomainError, DomainResult};
use crate::config::KafkaConfig;

/// Consumes commands from the plan-commands topic and answers on plan-results.
/// Each message is handled on its own task so a long search never blocks
/// the consumer.
pub struct KafkaCommandListener {
    consumer: StreamConsumer,
    producer: FutureProducer,
    handler: CommandHandler,
    results_topic: String,
}

impl KafkaCommandListener {
    pub fn new(config: &KafkaConfig, producer: FutureProducer, handler: CommandHandler) -> DomainResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.group_id)
            .set("client.id", &config.client_id)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| DomainError::InfrastructureError(format!("Failed to create Kafka consumer: {}", e)))?;

        consumer
            .subscribe(&[config.topics.plan_commands.as_str()])
            .map_err(|e| DomainError::InfrastructureError(format!("Failed to subscribe: {}", e)))?;

        info!(topic = %config.topics.plan_commands, "listening for plan commands");
        Ok(Self {
            consumer,
            producer,
            handler,
            results_topic: config.topics.plan_results.clone(),
        })
    }

    /// Runs until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("command listener stopping");
                        break;
                    }
                }
                message = self.consumer.recv() => {
                    let message = match message {
                        Ok(m) => m,
                        Err(e) => {
                            warn!(error = %e, "failed to receive command");
                            continue;
                        }
                    };
                    let Some(payload) = message.payload().map(<[u8]>::to_vec) else {
                        debug!("skipping command without payload");
                        continue;
                    };
                    let key = message.key().map(|k| String::from_utf8_lossy(k).into_owned());

                    let handler = self.handler.clone();
                    let producer = self.producer.clone();
                    let topic = self.results_topic.clone();
                    tokio::spawn(async move {
                        let reply = handler.handle_bytes(&payload).await;
                        if let Err(e) = send_reply(&producer, &topic, key.as_deref(), &reply).await {
                            error!(error = %e, "failed to publish reply");
                        }
                    });
                }
            }
        }
    }
}

async fn send_reply(
    producer: &FutureProducer,
    topic: &str,
    key: Option<&str>,
    reply: &PlanReply,
) -> DomainResult<()> {
    let payload = serde_json::to_vec(reply)?;
    let key = key.or(reply.request_id.as_deref()).unwrap_or_default();
    producer
        .send(FutureRecord::to(topic).key(key).payload(&payload), Duration::from_secs(5))
        .await
        .map_err(|(e, _)| DomainError::InfrastructureError(format!("Failed to send reply to Kafka: {}", e)))?;
    Ok(())
}

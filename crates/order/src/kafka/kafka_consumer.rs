use async_trait::async_trait;
use rdkafka::{
    Message, Offset, TopicPartitionList,
    config::ClientConfig,
    consumer::{Consumer, StreamConsumer},
    error::KafkaResult,
};
use shared::{abstract_trait::DynKafka, errors::ServiceError};
use tracing::{debug, info};

use crate::{
    abstract_trait::kafka::{DeadLetterSinkTrait, MessageStreamTrait},
    domain::event::{DeadLetterRecord, InboundMessage},
};

/// Checkout topic subscription. Offsets are stored only when a message is
/// acked and committed in the background, so anything not acked is redelivered.
pub struct KafkaCheckoutStream {
    consumer: StreamConsumer,
}

impl KafkaCheckoutStream {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> KafkaResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("allow.auto.create.topics", "true")
            .create()?;

        consumer.subscribe(&[topic])?;

        info!("✅ Kafka consumer started, subscribed to {topic} as {group_id}");

        Ok(Self { consumer })
    }
}

#[async_trait]
impl MessageStreamTrait for KafkaCheckoutStream {
    async fn fetch(&self) -> Result<Option<InboundMessage>, ServiceError> {
        let message = self.consumer.recv().await?;

        let inbound = InboundMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message
                .key()
                .and_then(|k| std::str::from_utf8(k).ok())
                .map(str::to_string),
            payload: message.payload().map(<[u8]>::to_vec),
        };

        debug!(
            topic = inbound.topic,
            partition = inbound.partition,
            offset = inbound.offset,
            "Payload received"
        );

        Ok(Some(inbound))
    }

    async fn ack(&self, message: &InboundMessage) -> Result<(), ServiceError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;

        self.consumer.store_offsets(&offsets)?;
        Ok(())
    }

    async fn close(&self) {
        self.consumer.unsubscribe();
        info!("Kafka consumer unsubscribed");
    }
}

pub struct KafkaDeadLetterSink {
    kafka: DynKafka,
    topic: String,
}

impl KafkaDeadLetterSink {
    pub fn new(kafka: DynKafka, topic: impl Into<String>) -> Self {
        Self {
            kafka,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl DeadLetterSinkTrait for KafkaDeadLetterSink {
    async fn send(&self, record: &DeadLetterRecord) -> Result<(), ServiceError> {
        let payload = serde_json::to_vec(record)
            .map_err(|e| ServiceError::Internal(format!("Failed to encode dead letter: {e}")))?;

        let key = record.key.clone().unwrap_or_else(|| {
            format!(
                "{}-{}-{}",
                record.source_topic, record.partition, record.offset
            )
        });

        self.kafka.publish(&self.topic, &key, &payload).await
    }
}

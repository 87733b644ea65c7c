//! Kafka stream backend using rdkafka.
//!
//! # Feature flag
//!
//! This module is gated behind the `kafka` feature flag:
//! ```toml
//! [dependencies]
//! order-relay = { version = "0.1", features = ["kafka"] }
//! ```
//!
//! The consumer runs with `enable.auto.commit=false`; offsets are committed
//! only through [`OrderStream::commit`], one message at a time. Commits are
//! handed to librdkafka asynchronously so the runtime thread never waits on
//! a broker round trip. A lost commit only means redelivery.
//!
//! Kafka tracks one committed offset per partition. Committing `offset + 1`
//! for a later message therefore also acknowledges any earlier message of the
//! same partition that was left unacknowledged after its retries ran out.
//! Such an order is only redelivered if the group rebalances or restarts
//! before a later message on that partition is committed.

use crate::config::StreamConfig;
use crate::core::{OrderPublisher, OrderStream, StreamError, StreamMessage};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumer-group member reading order messages from one topic
pub struct KafkaOrderStream {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaOrderStream {
    pub fn new(config: &StreamConfig) -> Result<Self, StreamError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(StreamError::backend)?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(StreamError::backend)?;

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl OrderStream for KafkaOrderStream {
    async fn fetch_next(&self, cancel: &CancellationToken) -> Result<StreamMessage, StreamError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StreamError::Cancelled),
            received = self.consumer.recv() => {
                let message = received.map_err(StreamError::backend)?;
                Ok(StreamMessage {
                    partition: message.partition(),
                    offset: message.offset(),
                    key: message.key().map(<[u8]>::to_vec),
                    payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                })
            }
        }
    }

    async fn commit(&self, message: &StreamMessage) -> Result<(), StreamError> {
        let offsets = commit_offsets(&self.topic, message)?;
        self.consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(StreamError::backend)
    }
}

/// Offsets to commit once `message` is handled: the next one to read.
fn commit_offsets(topic: &str, message: &StreamMessage) -> Result<TopicPartitionList, StreamError> {
    let mut offsets = TopicPartitionList::new();
    offsets
        .add_partition_offset(topic, message.partition, Offset::Offset(message.offset + 1))
        .map_err(StreamError::backend)?;
    Ok(offsets)
}

/// Producer writing order messages to one topic with `acks=all`
pub struct KafkaOrderPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaOrderPublisher {
    pub fn new(config: &StreamConfig) -> Result<Self, StreamError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("acks", "all")
            .set("message.timeout.ms", PUBLISH_TIMEOUT.as_millis().to_string())
            .create()
            .map_err(StreamError::backend)?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl OrderPublisher for KafkaOrderPublisher {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<(), StreamError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);
        self.producer
            .send(record, PUBLISH_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|(e, _)| StreamError::backend(e))
    }
}

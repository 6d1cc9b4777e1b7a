// ============================================================================
// Dead-Letter Routing
// ============================================================================
//
// A message whose handler failed on every attempt is parked on
// `{topic}_error` for manual inspection or replay:
//
// - the dead-letter topic is provisioned with one partition and
//   replication factor 1 (low volume, failures stay ordered)
// - the message is republished byte-for-byte: key, value and headers are
//   untouched (the correlation id included), only topic and partition change
// - a short-lived producer is used and flushed with a bounded wait
// - any failure is returned; there is no further fallback destination
//
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use courier_config::{
    DEAD_LETTER_FLUSH_TIMEOUT_MS, DEAD_LETTER_PARTITIONS, DEAD_LETTER_REPLICATION_FACTOR,
    DEAD_LETTER_SUFFIX,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::admin::TopicProvisioner;
use super::broker::ProducerFactory;
use super::metrics;
use super::types::{Message, TopicSpec};
use crate::error::RouteError;

/// Name of the dead-letter topic for `topic`
pub fn dead_letter_topic(topic: &str) -> String {
    format!("{}{}", topic, DEAD_LETTER_SUFFIX)
}

#[derive(Clone)]
pub struct DeadLetterRouter {
    provisioner: Arc<dyn TopicProvisioner>,
    producers: Arc<dyn ProducerFactory>,
    flush_timeout: Duration,
}

impl DeadLetterRouter {
    pub fn new(provisioner: Arc<dyn TopicProvisioner>, producers: Arc<dyn ProducerFactory>) -> Self {
        Self {
            provisioner,
            producers,
            flush_timeout: Duration::from_millis(DEAD_LETTER_FLUSH_TIMEOUT_MS),
        }
    }

    /// Republishes `message` on its dead-letter topic and returns that topic.
    pub async fn route(&self, message: Message) -> Result<String, RouteError> {
        let result = self.republish(message).await;
        if result.is_err() {
            metrics::DEAD_LETTER_FAILURE.inc();
        }
        result
    }

    async fn republish(&self, mut message: Message) -> Result<String, RouteError> {
        let topic = dead_letter_topic(&message.topic);
        let producer = self
            .producers
            .create_producer()
            .map_err(RouteError::Connect)?;

        self.provisioner
            .ensure(&TopicSpec::new(
                topic.clone(),
                DEAD_LETTER_PARTITIONS,
                DEAD_LETTER_REPLICATION_FACTOR,
            ))
            .await?;

        let source_topic = std::mem::replace(&mut message.topic, topic.clone());
        let source_partition = message.partition.take();
        let source_offset = message.offset;

        let (reports, mut delivery) = mpsc::channel(1);
        producer
            .enqueue(&message, reports)
            .map_err(|source| RouteError::Enqueue {
                topic: topic.clone(),
                source,
            })?;
        producer
            .flush(self.flush_timeout)
            .map_err(RouteError::Flush)?;

        match delivery.try_recv() {
            Ok(Ok(delivered)) => {
                info!(
                    source_topic = %source_topic,
                    source_partition = ?source_partition,
                    source_offset = ?source_offset,
                    topic = %delivered.topic,
                    partition = delivered.partition,
                    offset = delivered.offset,
                    "Message moved to dead-letter topic"
                );
            }
            Ok(Err(e)) => {
                error!(
                    source_topic = %source_topic,
                    source_offset = ?source_offset,
                    error = %e,
                    "Dead-letter delivery failed"
                );
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    source_topic = %source_topic,
                    topic = %topic,
                    flush_timeout_ms = self.flush_timeout.as_millis() as u64,
                    "Dead-letter producer flushed without a delivery report"
                );
            }
        }

        metrics::MESSAGES_DEAD_LETTERED.inc();
        Ok(topic)
    }
}

use std::time::Duration;

use courier_config::KafkaConfig;
use rdkafka::client::ClientContext;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, Message as _, OwnedHeaders};
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::util::Timeout;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::config::producer_client_config;
use super::types::{Delivered, DeliveryReport, Message};
use crate::error::DeliveryError;

/// Where a sink sends the outcome of each enqueued message
pub type ReportSender = mpsc::Sender<DeliveryReport>;

/// A live producer handle.
///
/// `enqueue` returns as soon as the broker client accepted the message; the
/// delivery outcome arrives later on `reports`.
pub trait MessageSink: Send + Sync {
    fn enqueue(&self, message: &Message, reports: ReportSender) -> Result<(), KafkaError>;

    /// Waits up to `timeout` for in-flight messages
    fn flush(&self, timeout: Duration) -> Result<(), KafkaError>;
}

/// Opens producer handles. Failing to reach the broker surfaces here.
pub trait ProducerFactory: Send + Sync {
    fn create_producer(&self) -> Result<Box<dyn MessageSink>, KafkaError>;
}

/// Kafka-backed producer factory
#[derive(Clone)]
pub struct KafkaBroker {
    config: KafkaConfig,
}

impl KafkaBroker {
    pub fn new(config: KafkaConfig) -> Self {
        Self { config }
    }
}

impl ProducerFactory for KafkaBroker {
    fn create_producer(&self) -> Result<Box<dyn MessageSink>, KafkaError> {
        let producer: ThreadedProducer<DeliveryReporter> =
            producer_client_config(&self.config).create_with_context(DeliveryReporter)?;

        info!(brokers = %self.config.brokers, "Kafka producer created");
        Ok(Box::new(KafkaSink { producer }))
    }
}

/// Forwards librdkafka delivery callbacks into the report channel that was
/// attached to the record when it was enqueued.
pub struct DeliveryReporter;

impl ClientContext for DeliveryReporter {}

impl ProducerContext for DeliveryReporter {
    type DeliveryOpaque = Box<ReportSender>;

    fn delivery(&self, result: &DeliveryResult<'_>, reports: Self::DeliveryOpaque) {
        let report = match result {
            Ok(msg) => delivery_report(msg.topic(), msg.partition(), msg.offset(), None),
            Err((error, msg)) => {
                delivery_report(msg.topic(), msg.partition(), msg.offset(), Some(error))
            }
        };

        // Runs on the librdkafka polling thread, so never block here.
        if let Err(e) = reports.try_send(report) {
            warn!(error = %e, "Dropped Kafka delivery report");
        }
    }
}

struct KafkaSink {
    producer: ThreadedProducer<DeliveryReporter>,
}

impl MessageSink for KafkaSink {
    fn enqueue(&self, message: &Message, reports: ReportSender) -> Result<(), KafkaError> {
        self.producer
            .send(to_record(message, reports))
            .map_err(|(error, _)| error)
    }

    fn flush(&self, timeout: Duration) -> Result<(), KafkaError> {
        self.producer.flush(Timeout::After(timeout))
    }
}

/// Maps a delivery callback onto a report. librdkafka uses -1 for a message
/// that never got a partition assigned.
fn delivery_report(
    topic: &str,
    partition: i32,
    offset: i64,
    error: Option<&KafkaError>,
) -> DeliveryReport {
    match error {
        None => Ok(Delivered {
            topic: topic.to_string(),
            partition,
            offset,
        }),
        Some(error) => Err(DeliveryError {
            topic: topic.to_string(),
            partition: (partition >= 0).then_some(partition),
            error: error.clone(),
        }),
    }
}

/// Builds the librdkafka record for `message`.
///
/// A null value or header value stays null. `Message::offset` has no
/// producer-side meaning and is not sent.
fn to_record(message: &Message, reports: ReportSender) -> BaseRecord<'_, [u8], [u8], Box<ReportSender>> {
    let mut headers = OwnedHeaders::new_with_capacity(message.headers.len());
    for (key, value) in message.headers.iter() {
        headers = headers.insert(Header { key, value });
    }

    let mut record: BaseRecord<'_, [u8], [u8], Box<ReportSender>> =
        BaseRecord::with_opaque_to(&message.topic, Box::new(reports)).headers(headers);
    if let Some(value) = &message.value {
        record = record.payload(value.as_slice());
    }
    if let Some(key) = &message.key {
        record = record.key(key.as_slice());
    }
    if let Some(partition) = message.partition {
        record = record.partition(partition);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::types::Headers;
    use rdkafka::message::Headers as _;
    use rdkafka::types::RDKafkaErrorCode;

    fn reports() -> ReportSender {
        mpsc::channel(1).0
    }

    #[test]
    fn test_record_keeps_null_header_values() {
        let mut headers = Headers::new();
        headers.push("X-Tenant-Id", "acme");
        headers.push_null("X-Author");
        let message = Message::new("orders", b"{}".to_vec())
            .with_key("order-1")
            .with_headers(headers);

        let record = to_record(&message, reports());

        assert_eq!(record.topic, "orders");
        assert_eq!(record.partition, None);
        assert_eq!(record.key, Some(b"order-1".as_slice()));
        assert_eq!(record.payload, Some(b"{}".as_slice()));

        let headers = record.headers.as_ref().unwrap();
        assert_eq!(headers.count(), 2);
        assert_eq!(headers.get(0).key, "X-Tenant-Id");
        assert_eq!(headers.get(0).value, Some(b"acme".as_slice()));
        assert_eq!(headers.get(1).key, "X-Author");
        assert_eq!(headers.get(1).value, None);
    }

    #[test]
    fn test_record_for_tombstone_has_no_payload() {
        let mut message = Message::tombstone("orders");
        message.partition = Some(2);

        let record = to_record(&message, reports());

        assert_eq!(record.payload, None);
        assert_eq!(record.key, None);
        assert_eq!(record.partition, Some(2));
    }

    #[test]
    fn test_successful_delivery_report() {
        let report = delivery_report("orders", 3, 17, None);
        assert_eq!(
            report.unwrap(),
            Delivered {
                topic: "orders".to_string(),
                partition: 3,
                offset: 17
            }
        );
    }

    #[test]
    fn test_failed_delivery_report() {
        let error = KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut);

        let assigned = delivery_report("orders", 1, -1, Some(&error)).unwrap_err();
        assert_eq!(assigned.topic, "orders");
        assert_eq!(assigned.partition, Some(1));

        let unassigned = delivery_report("orders", -1, -1, Some(&error)).unwrap_err();
        assert_eq!(unassigned.partition, None);
        assert!(matches!(
            unassigned.error,
            KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut)
        ));
    }
}

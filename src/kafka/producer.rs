use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use courier_config::{DeliveryFailurePolicy, KafkaConfig, ProducerConfig, DELIVERY_REPORT_CAPACITY};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, Instrument};

use super::broker::{KafkaBroker, MessageSink, ProducerFactory};
use super::context::RequestContext;
use super::metrics;
use super::types::{DeliveryReport, Message};
use crate::error::{DeliveryError, PublishError};

/// Invoked by the delivery drain for every message the broker lost
pub type DeliveryFailureCallback = Arc<dyn Fn(&DeliveryError) + Send + Sync>;

/// Publishes JSON payloads to one topic with request correlation headers.
///
/// `publish` only reports what fails synchronously (connecting, serializing,
/// enqueueing). Broker acknowledgements are drained in the background by a
/// task spawned per call; a lost message is handled by the configured
/// [`DeliveryFailurePolicy`] and never reaches the caller.
pub struct ResilientProducer<T> {
    config: ProducerConfig,
    producers: Arc<dyn ProducerFactory>,
    on_delivery_failure: Option<DeliveryFailureCallback>,
    _payload: PhantomData<fn(&T)>,
}

impl<T: Serialize> ResilientProducer<T> {
    pub fn new(config: ProducerConfig, producers: Arc<dyn ProducerFactory>) -> Self {
        Self {
            config,
            producers,
            on_delivery_failure: None,
            _payload: PhantomData,
        }
    }

    pub fn kafka(kafka: &KafkaConfig, config: ProducerConfig) -> Self {
        Self::new(config, Arc::new(KafkaBroker::new(kafka.clone())))
    }

    pub fn with_failure_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DeliveryError) + Send + Sync + 'static,
    {
        self.on_delivery_failure = Some(Arc::new(callback));
        self
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Serializes and enqueues `payloads` in order.
    ///
    /// Stops at the first payload that cannot be serialized or enqueued;
    /// the ones before it are already on their way. Delivery reports are
    /// drained on the current Tokio runtime; without one nothing is sent and
    /// [`PublishError::NoRuntime`] is returned.
    pub fn publish(&self, ctx: &RequestContext, payloads: &[T]) -> Result<(), PublishError> {
        let span = info_span!(
            "kafka.publish",
            otel.kind = "client",
            messaging.destination = %self.config.topic,
            enqueued = tracing::field::Empty,
        );
        let _guard = span.enter();

        let runtime = Handle::try_current().map_err(|_| {
            metrics::PUBLISH_FAILURE.inc();
            error!(topic = %self.config.topic, "publish called outside a Tokio runtime");
            PublishError::NoRuntime
        })?;

        let headers = ctx.to_headers();
        let producer: Arc<dyn MessageSink> = match self.producers.create_producer() {
            Ok(producer) => Arc::from(producer),
            Err(e) => {
                metrics::PUBLISH_FAILURE.inc();
                error!(topic = %self.config.topic, error = %e, "Failed to create Kafka producer");
                return Err(PublishError::Connect(e));
            }
        };

        let (reports, delivery) = mpsc::channel(DELIVERY_REPORT_CAPACITY);
        runtime.spawn(
            self.delivery_drain()
                .run(producer.clone(), delivery)
                .instrument(span.clone()),
        );

        let mut enqueued: u64 = 0;
        span.record("enqueued", enqueued);
        for payload in payloads {
            let value = serde_json::to_vec(payload).map_err(|e| {
                metrics::PUBLISH_FAILURE.inc();
                error!(topic = %self.config.topic, enqueued, error = %e, "Failed to serialize payload");
                PublishError::Serialization(e)
            })?;

            let mut message = Message::new(self.config.topic.clone(), value)
                .with_headers(headers.clone());
            message.partition = self.config.partition;
            message.offset = self.config.offset;

            producer
                .enqueue(&message, reports.clone())
                .map_err(|source| {
                    metrics::PUBLISH_FAILURE.inc();
                    error!(topic = %self.config.topic, enqueued, error = %source, "Failed to enqueue message");
                    PublishError::Enqueue {
                        topic: self.config.topic.clone(),
                        source,
                    }
                })?;

            enqueued += 1;
            span.record("enqueued", enqueued);
            metrics::PUBLISH_ENQUEUED.inc();
        }

        debug!(topic = %self.config.topic, enqueued, "Payloads enqueued");
        Ok(())
    }

    fn delivery_drain(&self) -> DeliveryDrain {
        DeliveryDrain {
            verbose: self.config.verbose_logging,
            policy: self.config.delivery_failure_policy,
            flush_timeout: self.config.flush_timeout,
            on_failure: self.on_delivery_failure.clone(),
        }
    }
}

/// Background half of a publish call
struct DeliveryDrain {
    verbose: bool,
    policy: DeliveryFailurePolicy,
    flush_timeout: Duration,
    on_failure: Option<DeliveryFailureCallback>,
}

impl DeliveryDrain {
    /// Consumes delivery reports until every enqueued message has been
    /// acknowledged, then flushes and releases the producer handle.
    async fn run(self, producer: Arc<dyn MessageSink>, mut delivery: mpsc::Receiver<DeliveryReport>) {
        while let Some(report) = delivery.recv().await {
            match report {
                Ok(delivered) => {
                    metrics::DELIVERY_SUCCESS.inc();
                    if self.verbose {
                        info!(
                            topic = %delivered.topic,
                            partition = delivered.partition,
                            offset = delivered.offset,
                            "Message delivered"
                        );
                    } else {
                        debug!(
                            topic = %delivered.topic,
                            partition = delivered.partition,
                            offset = delivered.offset,
                            "Message delivered"
                        );
                    }
                }
                Err(e) => {
                    if delivery_failed(self.policy, &e, self.on_failure.as_ref()) {
                        std::process::exit(1);
                    }
                }
            }
        }

        if let Err(e) = producer.flush(self.flush_timeout) {
            error!(error = %e, "Failed to flush Kafka producer");
        }
    }
}

/// Applies the failure policy to one lost message. Returns true when the
/// process has to terminate.
fn delivery_failed(
    policy: DeliveryFailurePolicy,
    error: &DeliveryError,
    on_failure: Option<&DeliveryFailureCallback>,
) -> bool {
    metrics::DELIVERY_FAILURE.inc();
    error!(
        topic = %error.topic,
        partition = ?error.partition,
        error = %error.error,
        "Message delivery failed"
    );

    match policy {
        DeliveryFailurePolicy::Report => {
            if let Some(callback) = on_failure {
                callback(error);
            }
            false
        }
        DeliveryFailurePolicy::Abort => {
            error!("Delivery failure policy is abort, terminating");
            true
        }
    }
}

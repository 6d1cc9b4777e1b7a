use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use courier_config::{ConsumerConfig, KafkaConfig};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use tracing::{debug, error, info, warn};

use super::admin::{KafkaTopicProvisioner, TopicProvisioner};
use super::broker::{KafkaBroker, ProducerFactory};
use super::config::consumer_client_config;
use super::context::ProcessingContext;
use super::dead_letter::DeadLetterRouter;
use super::metrics;
use super::types::{Message, TopicSpec};
use crate::error::{HandlerFault, ProvisionError, RouteError};

/// User message handler.
///
/// Called once per attempt with a fresh context. Returning `Err` (or
/// panicking) marks the attempt as failed.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, ctx: &ProcessingContext<'_>) -> anyhow::Result<()>;
}

impl<F> MessageHandler for F
where
    F: Fn(&ProcessingContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, ctx: &ProcessingContext<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Pins a closure to the handler signature so its argument and return types
/// can be inferred at the call site.
pub fn handler_fn<F>(f: F) -> F
where
    F: Fn(&ProcessingContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    f
}

/// How a message left the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Processed { attempts: u32 },
    DeadLettered { attempts: u32, topic: String },
}

impl Outcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Processed { attempts } | Outcome::DeadLettered { attempts, .. } => *attempts,
        }
    }
}

/// Runs a handler over every message of one topic with bounded retry.
///
/// A message whose handler keeps failing is moved to `{topic}_error` once the
/// retry budget is spent. With `max_retries` N > 1 the handler sees the
/// message N times; 0 and 1 both mean a single attempt.
pub struct ResilientConsumer<H> {
    config: ConsumerConfig,
    handler: H,
    provisioner: Arc<dyn TopicProvisioner>,
    router: DeadLetterRouter,
}

impl<H: MessageHandler> ResilientConsumer<H> {
    pub fn new(
        config: ConsumerConfig,
        handler: H,
        provisioner: Arc<dyn TopicProvisioner>,
        producers: Arc<dyn ProducerFactory>,
    ) -> Self {
        let router = DeadLetterRouter::new(provisioner.clone(), producers);
        Self {
            config,
            handler,
            provisioner,
            router,
        }
    }

    /// Builds a Kafka-backed consumer and makes sure its topic exists.
    ///
    /// Provisioning failure is logged and tolerated; the subscription will
    /// report it if the topic really is missing.
    pub async fn kafka(
        kafka: &KafkaConfig,
        config: ConsumerConfig,
        handler: H,
    ) -> Result<Self, ProvisionError> {
        let provisioner = Arc::new(KafkaTopicProvisioner::new(kafka)?);
        let producers = Arc::new(KafkaBroker::new(kafka.clone()));
        let consumer = Self::new(config, handler, provisioner, producers);

        if let Err(e) = consumer.provision().await {
            warn!(topic = %consumer.config.topic, error = %e, "Failed to provision consumed topic");
        }
        Ok(consumer)
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Ensures the consumed topic exists with the configured layout
    pub async fn provision(&self) -> Result<(), ProvisionError> {
        self.provisioner
            .ensure(&TopicSpec::new(
                self.config.topic.clone(),
                self.config.partitions,
                self.config.replication_factor,
            ))
            .await
    }

    /// Processes one message to completion.
    ///
    /// Handler failures never escape; the only error is a failed dead-letter
    /// hand-off, in which case the message must not be acknowledged.
    pub async fn handle_message(&self, message: Message) -> Result<Outcome, RouteError> {
        let mut remaining = self.config.max_retries;
        let mut attempt = 1;

        loop {
            let ctx = ProcessingContext::new(&message, remaining, attempt);
            let fault = match self.invoke(&ctx) {
                Ok(()) => {
                    metrics::MESSAGES_PROCESSED.inc();
                    if self.config.verbose_logging {
                        info!(
                            topic = %message.topic,
                            offset = ?message.offset,
                            attempt = attempt,
                            "Message processed"
                        );
                    }
                    return Ok(Outcome::Processed { attempts: attempt });
                }
                Err(fault) => fault,
            };

            metrics::HANDLER_FAILURES.inc();
            warn!(
                topic = %message.topic,
                partition = ?message.partition,
                offset = ?message.offset,
                correlation_id = ctx.request.correlation_id().unwrap_or("-"),
                attempt = attempt,
                remaining_retries = remaining,
                error = %fault,
                "Message handler failed"
            );

            if remaining <= 1 {
                break;
            }
            remaining -= 1;
            attempt += 1;

            if !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        let offset = message.offset;
        match self.router.route(message).await {
            Ok(topic) => {
                warn!(
                    topic = %topic,
                    source_offset = ?offset,
                    attempts = attempt,
                    "Retries exhausted, message dead-lettered"
                );
                Ok(Outcome::DeadLettered {
                    attempts: attempt,
                    topic,
                })
            }
            Err(e) => {
                error!(
                    topic = %self.config.topic,
                    offset = ?offset,
                    error = %e,
                    "Failed to dead-letter message"
                );
                Err(e)
            }
        }
    }

    fn invoke(&self, ctx: &ProcessingContext<'_>) -> Result<(), HandlerFault> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(ctx))) {
            Ok(result) => result.map_err(HandlerFault::Failed),
            Err(payload) => Err(HandlerFault::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Consumes until `shutdown` is set.
    ///
    /// Offsets are committed after a message is processed or dead-lettered.
    /// A failed dead-letter hand-off stops the loop without committing, so
    /// the message is redelivered on restart.
    pub async fn run(&self, kafka: &KafkaConfig, shutdown: Arc<AtomicBool>) -> Result<()> {
        let consumer: StreamConsumer = consumer_client_config(kafka, &self.config)
            .create()
            .context("Failed to create Kafka consumer")?;
        consumer
            .subscribe(&[&self.config.topic])
            .context("Failed to subscribe to Kafka topic")?;

        info!(
            topic = %self.config.topic,
            group_id = %self.config.group_id,
            max_retries = self.config.max_retries,
            "Kafka consumer started"
        );

        let mut processed: u64 = 0;
        let mut dead_lettered: u64 = 0;
        let mut last_stats_log = Instant::now();

        while !shutdown.load(Ordering::SeqCst) {
            match tokio::time::timeout(self.config.poll_timeout, consumer.recv()).await {
                Err(_) => {}
                Ok(Err(e)) => {
                    metrics::CONSUME_FAILURE.inc();
                    error!(error = %e, "Kafka consumer error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Ok(Ok(borrowed)) => {
                    let outcome = self
                        .handle_message(Message::from(&borrowed))
                        .await
                        .with_context(|| {
                            format!("Message on {} could not be dead-lettered", self.config.topic)
                        })?;

                    match outcome {
                        Outcome::Processed { .. } => processed += 1,
                        Outcome::DeadLettered { .. } => dead_lettered += 1,
                    }

                    if let Err(e) = consumer.commit_message(&borrowed, CommitMode::Async) {
                        error!(error = %e, "Failed to commit Kafka offset");
                    } else {
                        debug!(outcome = ?outcome, "Kafka offset committed");
                    }
                }
            }

            if last_stats_log.elapsed() >= Duration::from_secs(30) {
                info!(
                    processed = processed,
                    dead_lettered = dead_lettered,
                    "Consumer stats (last 30s)"
                );
                processed = 0;
                dead_lettered = 0;
                last_stats_log = Instant::now();
            }
        }

        info!(topic = %self.config.topic, "Shutdown requested, consumer stopped");
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::memory::InMemoryBroker;
    use std::sync::atomic::AtomicU32;

    fn consumer<H: MessageHandler>(
        broker: &InMemoryBroker,
        max_retries: u32,
        handler: H,
    ) -> ResilientConsumer<H> {
        ResilientConsumer::new(
            ConsumerConfig::new("orders", "billing").with_max_retries(max_retries),
            handler,
            Arc::new(broker.clone()),
            Arc::new(broker.clone()),
        )
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let broker = InMemoryBroker::new();
        let consumer = consumer(&broker, 3, handler_fn(|_| Ok(())));

        let outcome = consumer
            .handle_message(Message::new("orders", b"{}".to_vec()))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Processed { attempts: 1 });
        assert!(broker.messages().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let broker = InMemoryBroker::new();
        let calls = AtomicU32::new(0);
        let consumer = consumer(&broker, 3, handler_fn(|_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("transient");
            }
            Ok(())
        }));

        let outcome = consumer
            .handle_message(Message::new("orders", b"{}".to_vec()))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Processed { attempts: 2 });
        assert!(broker.messages_for("orders_error").is_empty());
    }

    #[tokio::test]
    async fn test_context_counts_down() {
        let broker = InMemoryBroker::new();
        let seen = std::sync::Mutex::new(Vec::new());
        let consumer = consumer(&broker, 3, handler_fn(|ctx| {
            seen.lock()
                .unwrap()
                .push((ctx.attempt, ctx.remaining_retries, ctx.faulted));
            anyhow::bail!("always")
        }));

        consumer
            .handle_message(Message::new("orders", b"{}".to_vec()))
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, 3, false), (2, 2, false), (3, 1, false)]
        );
    }

    #[tokio::test]
    async fn test_zero_budget_marks_context_faulted() {
        let broker = InMemoryBroker::new();
        let faulted = AtomicBool::new(false);
        let consumer = consumer(&broker, 0, handler_fn(|ctx| {
            faulted.store(ctx.faulted, Ordering::SeqCst);
            Ok(())
        }));

        consumer
            .handle_message(Message::new("orders", b"{}".to_vec()))
            .await
            .unwrap();

        assert!(faulted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panic_is_treated_as_failure() {
        let broker = InMemoryBroker::new();
        let consumer = consumer(&broker, 2, handler_fn(|_| panic!("handler blew up")));

        let outcome = consumer
            .handle_message(Message::new("orders", b"{}".to_vec()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::DeadLettered {
                attempts: 2,
                topic: "orders_error".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_provision_uses_configured_layout() {
        let broker = InMemoryBroker::new();
        let mut config = ConsumerConfig::new("orders", "billing");
        config.partitions = 4;
        let consumer = ResilientConsumer::new(
            config,
            handler_fn(|_| Ok(())),
            Arc::new(broker.clone()),
            Arc::new(broker.clone()),
        );

        consumer.provision().await.unwrap();

        assert_eq!(broker.topic("orders"), Some(TopicSpec::new("orders", 4, 1)));
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }
}

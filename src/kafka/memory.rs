//! In-process broker.
//!
//! Implements the provisioning and producer seams without a Kafka cluster,
//! with switches to inject the failures a real broker can produce.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use tracing::debug;

use super::admin::TopicProvisioner;
use super::broker::{MessageSink, ProducerFactory, ReportSender};
use super::types::{Delivered, Message, TopicSpec};
use crate::error::{DeliveryError, ProvisionError};

#[derive(Default)]
struct State {
    topics: HashMap<String, TopicSpec>,
    log: Vec<Message>,
    next_offsets: HashMap<(String, i32), i64>,
    rejected_topics: HashSet<String>,
    unwritable_topics: HashSet<String>,
    undeliverable_topics: HashSet<String>,
    unreachable: bool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    producers_created: AtomicUsize,
    flushes: AtomicUsize,
}

/// Cheaply cloneable handle; clones share the same topics and log
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creating `topic` fails with an authorization error
    pub fn reject_topic(&self, topic: impl Into<String>) {
        lock(&self.inner.state).rejected_topics.insert(topic.into());
    }

    /// Enqueueing to `topic` fails synchronously
    pub fn fail_enqueue_to(&self, topic: impl Into<String>) {
        lock(&self.inner.state).unwritable_topics.insert(topic.into());
    }

    /// Messages to `topic` are accepted but their delivery report is a failure
    pub fn fail_delivery_to(&self, topic: impl Into<String>) {
        lock(&self.inner.state).undeliverable_topics.insert(topic.into());
    }

    /// Producer creation fails while set
    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.inner.state).unreachable = unreachable;
    }

    pub fn topic(&self, name: &str) -> Option<TopicSpec> {
        lock(&self.inner.state).topics.get(name).cloned()
    }

    /// Every successfully written message, in write order
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.inner.state).log.clone()
    }

    pub fn messages_for(&self, topic: &str) -> Vec<Message> {
        lock(&self.inner.state)
            .log
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    pub fn producers_created(&self) -> usize {
        self.inner.producers_created.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.inner.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicProvisioner for InMemoryBroker {
    async fn ensure(&self, spec: &TopicSpec) -> Result<(), ProvisionError> {
        let mut state = lock(&self.inner.state);
        if state.topics.contains_key(&spec.name) {
            debug!(topic = %spec.name, "Topic already exists");
            return Ok(());
        }
        if state.rejected_topics.contains(&spec.name) {
            return Err(ProvisionError::Rejected {
                topic: spec.name.clone(),
                code: RDKafkaErrorCode::TopicAuthorizationFailed,
            });
        }

        state.topics.insert(spec.name.clone(), spec.clone());
        Ok(())
    }
}

impl ProducerFactory for InMemoryBroker {
    fn create_producer(&self) -> Result<Box<dyn MessageSink>, KafkaError> {
        if lock(&self.inner.state).unreachable {
            return Err(KafkaError::ClientCreation(
                "all brokers are unreachable".to_string(),
            ));
        }

        self.inner.producers_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

impl MessageSink for InMemoryBroker {
    fn enqueue(&self, message: &Message, reports: ReportSender) -> Result<(), KafkaError> {
        let mut state = lock(&self.inner.state);
        if state.unwritable_topics.contains(&message.topic) {
            return Err(KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull));
        }

        let partition = message.partition.unwrap_or(0);
        let report = if state.undeliverable_topics.contains(&message.topic) {
            Err(DeliveryError {
                topic: message.topic.clone(),
                partition: Some(partition),
                error: KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut),
            })
        } else {
            let next = state
                .next_offsets
                .entry((message.topic.clone(), partition))
                .or_insert(0);
            let offset = *next;
            *next += 1;

            state.log.push(Message {
                partition: Some(partition),
                offset: Some(offset),
                ..message.clone()
            });
            Ok(Delivered {
                topic: message.topic.clone(),
                partition,
                offset,
            })
        };
        drop(state);

        if reports.try_send(report).is_err() {
            debug!(topic = %message.topic, "Delivery report dropped, receiver gone or full");
        }
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<(), KafkaError> {
        self.inner.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

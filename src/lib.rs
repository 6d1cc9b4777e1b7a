//! Resilient Kafka message processing.
//!
//! [`ResilientConsumer`] runs a handler with bounded retry and dead-letters
//! messages that keep failing; [`ResilientProducer`] publishes JSON payloads
//! carrying the caller's correlation headers.

pub mod error;
pub mod kafka;

pub use courier_config as config;
pub use error::{DeliveryError, HandlerFault, ProvisionError, PublishError, RouteError};
pub use kafka::{
    dead_letter_topic, handler_fn, InMemoryBroker, KafkaBroker, KafkaTopicProvisioner, Message,
    MessageHandler, Outcome, ProcessingContext, RequestContext, ResilientConsumer,
    ResilientProducer, TopicProvisioner, TopicSpec,
};

// Kafka integration for resilient message processing
//
// Consumers wrap a user handler in bounded retry and park messages that keep
// failing on `{topic}_error`. Producers publish JSON payloads with request
// correlation headers and drain broker acknowledgements in the background.

pub mod admin;
pub mod broker;
pub mod config;
pub mod consumer;
pub mod context;
pub mod dead_letter;
pub mod memory;
pub mod metrics;
pub mod producer;
pub mod types;

// Re-export commonly used types
pub use admin::{KafkaTopicProvisioner, TopicProvisioner};
pub use broker::{KafkaBroker, MessageSink, ProducerFactory};
pub use consumer::{handler_fn, MessageHandler, Outcome, ResilientConsumer};
pub use context::{ProcessingContext, RequestContext};
pub use dead_letter::{dead_letter_topic, DeadLetterRouter};
pub use memory::InMemoryBroker;
pub use producer::{DeliveryFailureCallback, ResilientProducer};
pub use types::{Delivered, DeliveryReport, Headers, Message, TopicSpec};

// ============================================================================
// Kafka Broker Tests
// ============================================================================
//
// These tests require a running Kafka broker.
//
// Run with: KAFKA_BROKERS=localhost:9092 cargo test --test kafka_broker_test -- --ignored
//
// ============================================================================

use std::sync::Arc;

use courier::config::{KafkaConfig, ProducerConfig};
use courier::{
    KafkaBroker, KafkaTopicProvisioner, RequestContext, ResilientProducer, TopicProvisioner,
    TopicSpec,
};

fn kafka_config() -> KafkaConfig {
    KafkaConfig::local(std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string()))
}

fn unique_topic(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn test_ensure_is_idempotent() {
    let provisioner = KafkaTopicProvisioner::new(&kafka_config()).unwrap();
    let spec = TopicSpec::new(unique_topic("courier-ensure"), 1, 1);

    provisioner.ensure(&spec).await.unwrap();
    provisioner.ensure(&spec).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_concurrent_ensure_both_succeed() {
    let provisioner = KafkaTopicProvisioner::new(&kafka_config()).unwrap();
    let spec = TopicSpec::new(unique_topic("courier-race"), 1, 1);

    let (first, second) = tokio::join!(provisioner.ensure(&spec), provisioner.ensure(&spec));

    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[tokio::test]
#[ignore]
async fn test_publish_to_real_broker() {
    let kafka = kafka_config();
    let topic = unique_topic("courier-publish");
    KafkaTopicProvisioner::new(&kafka)
        .unwrap()
        .ensure(&TopicSpec::new(topic.clone(), 1, 1))
        .await
        .unwrap();

    let producer: ResilientProducer<u32> =
        ResilientProducer::new(ProducerConfig::new(topic), Arc::new(KafkaBroker::new(kafka)));

    producer
        .publish(&RequestContext::new().with_tenant_id("acme"), &[1, 2, 3])
        .unwrap();
}

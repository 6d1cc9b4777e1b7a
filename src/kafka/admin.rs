use std::time::Duration;

use async_trait::async_trait;
use courier_config::KafkaConfig;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication, TopicResult};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use tracing::{debug, info};

use super::config::create_client_config;
use super::types::TopicSpec;
use crate::error::ProvisionError;

/// Makes sure a topic exists before anything produces to or consumes from it.
///
/// Implementations must be idempotent: an existing topic is a success and its
/// partition/replication settings are left alone. Errors are not retried.
#[async_trait]
pub trait TopicProvisioner: Send + Sync {
    async fn ensure(&self, spec: &TopicSpec) -> Result<(), ProvisionError>;
}

/// Provisions topics through the Kafka admin API
pub struct KafkaTopicProvisioner {
    admin: AdminClient<DefaultClientContext>,
    timeout: Duration,
}

impl KafkaTopicProvisioner {
    pub fn new(config: &KafkaConfig) -> Result<Self, ProvisionError> {
        let admin = create_client_config(config).create()?;
        Ok(Self {
            admin,
            timeout: Duration::from_millis(config.admin_timeout_ms),
        })
    }
}

#[async_trait]
impl TopicProvisioner for KafkaTopicProvisioner {
    async fn ensure(&self, spec: &TopicSpec) -> Result<(), ProvisionError> {
        let topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        let options = AdminOptions::new().operation_timeout(Some(self.timeout));

        let results = self.admin.create_topics([&topic], &options).await?;
        results.into_iter().try_for_each(check_topic_result)
    }
}

/// Maps one per-topic admin result; losing a creation race to another
/// client counts as success.
pub(crate) fn check_topic_result(result: TopicResult) -> Result<(), ProvisionError> {
    match result {
        Ok(topic) => {
            info!(topic = %topic, "Kafka topic created");
            Ok(())
        }
        Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
            debug!(topic = %topic, "Kafka topic already exists");
            Ok(())
        }
        Err((topic, code)) => Err(ProvisionError::Rejected { topic, code }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_topic_is_ok() {
        assert!(check_topic_result(Ok("orders".to_string())).is_ok());
    }

    #[test]
    fn test_existing_topic_is_ok() {
        let result = check_topic_result(Err((
            "orders".to_string(),
            RDKafkaErrorCode::TopicAlreadyExists,
        )));
        assert!(result.is_ok());
    }

    #[test]
    fn test_authorization_failure_is_reported() {
        let result = check_topic_result(Err((
            "orders".to_string(),
            RDKafkaErrorCode::TopicAuthorizationFailed,
        )));

        match result {
            Err(ProvisionError::Rejected { topic, code }) => {
                assert_eq!(topic, "orders");
                assert_eq!(code, RDKafkaErrorCode::TopicAuthorizationFailed);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

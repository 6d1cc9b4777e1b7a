use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use thiserror::Error;

/// Topic creation failed for a reason other than "already exists"
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Failed to reach Kafka admin API: {0}")]
    Client(#[from] KafkaError),

    #[error("Topic '{topic}' could not be created: {code}")]
    Rejected {
        topic: String,
        code: RDKafkaErrorCode,
    },
}

/// Abnormal handler termination.
///
/// Recovered by the retry envelope and turned into a retry or a dead-letter
/// action; it never escapes the consumer.
#[derive(Error, Debug)]
pub enum HandlerFault {
    #[error("Handler failed: {0}")]
    Failed(#[from] anyhow::Error),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

/// A message enqueued by a publish call was not delivered
#[derive(Error, Debug, Clone)]
#[error("Failed to deliver message to {topic} (partition {partition:?}): {error}")]
pub struct DeliveryError {
    pub topic: String,
    pub partition: Option<i32>,
    pub error: KafkaError,
}

/// Dead-letter republishing failed; there is no further fallback destination
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Failed to provision dead-letter topic: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Failed to create dead-letter producer: {0}")]
    Connect(#[source] KafkaError),

    #[error("Failed to enqueue message on dead-letter topic '{topic}': {source}")]
    Enqueue {
        topic: String,
        #[source]
        source: KafkaError,
    },

    #[error("Failed to flush dead-letter producer: {0}")]
    Flush(#[source] KafkaError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Synchronous failures of a publish call
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publish must be called from within a Tokio runtime")]
    NoRuntime,

    #[error("Failed to create Kafka producer: {0}")]
    Connect(#[source] KafkaError),

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to enqueue message on '{topic}': {source}")]
    Enqueue {
        topic: String,
        #[source]
        source: KafkaError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_error_names_topic() {
        let err = ProvisionError::Rejected {
            topic: "orders".to_string(),
            code: RDKafkaErrorCode::TopicAuthorizationFailed,
        };
        assert!(err.to_string().contains("'orders'"));
    }

    #[test]
    fn test_route_error_wraps_delivery() {
        let err: RouteError = DeliveryError {
            topic: "orders_error".to_string(),
            partition: Some(0),
            error: KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut),
        }
        .into();

        assert!(matches!(err, RouteError::Delivery(_)));
        assert!(err.to_string().contains("orders_error"));
    }
}

// ============================================================================
// Producer Configuration
// ============================================================================

use std::time::Duration;

use anyhow::Result;

use crate::env_or;

/// What the delivery drain does when the broker reports a lost message
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryFailurePolicy {
    /// Log the failure, count it and hand it to the failure callback
    #[default]
    Report,
    /// Log the failure and terminate the process (fail fast on data loss)
    Abort,
}

impl std::str::FromStr for DeliveryFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "report" => Ok(Self::Report),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown delivery failure policy '{}'", other)),
        }
    }
}

/// Settings used by every publish call of a resilient producer
#[derive(Clone, Debug)]
pub struct ProducerConfig {
    pub topic: String,
    /// `None` lets the broker pick the partition
    pub partition: Option<i32>,
    /// Informational only: copied onto outgoing messages but never sent to
    /// Kafka, which assigns offsets on write
    pub offset: Option<i64>,
    /// Bounded wait used when a publish call releases its producer handle
    pub flush_timeout: Duration,
    pub delivery_failure_policy: DeliveryFailurePolicy,
    pub verbose_logging: bool,
}

impl ProducerConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            offset: None,
            flush_timeout: Duration::from_secs(5),
            delivery_failure_policy: DeliveryFailurePolicy::Report,
            verbose_logging: false,
        }
    }

    /// Returns `None` when no output topic is configured
    pub(crate) fn from_env(verbose_logging: bool) -> Result<Option<Self>> {
        let Ok(topic) = std::env::var("COURIER_OUTPUT_TOPIC") else {
            return Ok(None);
        };

        let partition = match std::env::var("COURIER_OUTPUT_PARTITION") {
            Ok(raw) => Some(raw.trim().parse().map_err(|e| {
                anyhow::anyhow!("Invalid value for COURIER_OUTPUT_PARTITION: {} ({})", raw, e)
            })?),
            Err(_) => None,
        };

        Ok(Some(Self {
            topic,
            partition,
            offset: None,
            flush_timeout: Duration::from_millis(env_or("COURIER_FLUSH_TIMEOUT_MS", 5000)?),
            delivery_failure_policy: env_or(
                "COURIER_DELIVERY_FAILURE_POLICY",
                DeliveryFailurePolicy::Report,
            )?,
            verbose_logging,
        }))
    }
}

// ============================================================================
// Consumer Configuration
// ============================================================================

use std::time::Duration;

use anyhow::Result;

use crate::env_or;

/// Settings for one resilient consumer.
///
/// Immutable once the consumer is built. `max_retries` is the total number of
/// handler invocations for a failing message; 0 and 1 both mean "no retry".
#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    pub topic: String,
    pub group_id: String,
    /// "earliest" | "latest"
    pub auto_offset_reset: String,
    pub max_retries: u32,
    /// Partition count used when the consumed topic has to be created
    pub partitions: i32,
    pub replication_factor: i32,
    /// Pause between handler attempts; zero retries immediately
    pub retry_delay: Duration,
    pub poll_timeout: Duration,
    pub verbose_logging: bool,
}

impl ConsumerConfig {
    pub fn new(topic: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group_id: group_id.into(),
            auto_offset_reset: "earliest".to_string(),
            max_retries: 3,
            partitions: 1,
            replication_factor: 1,
            retry_delay: Duration::ZERO,
            poll_timeout: Duration::from_secs(1),
            verbose_logging: false,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub(crate) fn from_env(verbose_logging: bool) -> Result<Self> {
        let auto_offset_reset =
            std::env::var("COURIER_AUTO_OFFSET_RESET").unwrap_or_else(|_| "earliest".to_string());
        if !matches!(auto_offset_reset.as_str(), "earliest" | "latest") {
            anyhow::bail!(
                "COURIER_AUTO_OFFSET_RESET must be 'earliest' or 'latest', got '{}'",
                auto_offset_reset
            );
        }

        Ok(Self {
            topic: std::env::var("COURIER_TOPIC")
                .map_err(|_| anyhow::anyhow!("COURIER_TOPIC must be set"))?,
            group_id: std::env::var("COURIER_GROUP_ID")
                .unwrap_or_else(|_| "courier-workers".to_string()),
            auto_offset_reset,
            max_retries: env_or("COURIER_MAX_RETRIES", 3)?,
            partitions: env_or("COURIER_PARTITIONS", 1)?,
            replication_factor: env_or("COURIER_REPLICATION_FACTOR", 1)?,
            retry_delay: Duration::from_millis(env_or("COURIER_RETRY_DELAY_MS", 0)?),
            poll_timeout: Duration::from_millis(env_or("COURIER_POLL_TIMEOUT_MS", 1000)?),
            verbose_logging,
        })
    }
}

// ============================================================================
// Courier Config - Centralized configuration management
// ============================================================================
//
// Configuration for the courier library and worker. Everything is loaded
// from environment variables with sensible defaults.
//
// ============================================================================

mod constants;
mod consumer;
mod kafka;
mod logging;
mod producer;

pub use constants::{
    DEAD_LETTER_FLUSH_TIMEOUT_MS, DEAD_LETTER_PARTITIONS, DEAD_LETTER_REPLICATION_FACTOR,
    DEAD_LETTER_SUFFIX, DELIVERY_REPORT_CAPACITY,
};
pub use consumer::ConsumerConfig;
pub use kafka::KafkaConfig;
pub use logging::LoggingConfig;
pub use producer::{DeliveryFailurePolicy, ProducerConfig};

use anyhow::Result;

/// Main configuration structure for the courier worker
#[derive(Clone, Debug)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub consumer: ConsumerConfig,
    /// Relay target; the worker only publishes when this is set
    pub producer: Option<ProducerConfig>,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let logging = LoggingConfig::from_env();
        let consumer = ConsumerConfig::from_env(logging.verbose)?;
        let producer = ProducerConfig::from_env(logging.verbose)?;

        Ok(Self {
            kafka: KafkaConfig::from_env()?,
            consumer,
            producer,
            logging,
        })
    }
}

/// Reads `name` and parses it, falling back to `default` when unset.
///
/// A value that is set but malformed is an error rather than silently
/// replaced by the default.
pub(crate) fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", name, raw, e)),
        Err(_) => Ok(default),
    }
}

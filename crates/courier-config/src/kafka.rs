// ============================================================================
// Kafka Configuration
// ============================================================================

use anyhow::Result;

use crate::env_or;

/// Broker connection configuration.
///
/// The courier core treats this as opaque connection parameters and only
/// overlays consumer-specific keys on top of it.
#[derive(Clone, Debug)]
pub struct KafkaConfig {
    /// Comma-separated list of Kafka brokers (e.g., "kafka1:9092,kafka2:9092")
    pub brokers: String,
    /// Client identity reported to the brokers
    pub client_id: String,
    /// "all" | "1" | "0"
    pub acks: String,
    /// SSL/TLS enabled
    pub ssl_enabled: bool,
    /// SASL mechanism (e.g., "SCRAM-SHA-256", "PLAIN")
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    /// Path to CA certificate file (for self-signed certificates)
    pub ssl_ca_location: Option<String>,
    /// Timeout for admin operations such as topic creation
    pub admin_timeout_ms: u64,
}

impl KafkaConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Ok(Self {
            brokers: std::env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            client_id: std::env::var("KAFKA_CLIENT_ID")
                .or_else(|_| std::env::var("HOSTNAME"))
                .unwrap_or_else(|_| "courier".to_string()),
            acks: std::env::var("KAFKA_ACKS").unwrap_or_else(|_| "all".to_string()),
            ssl_enabled: env_or("KAFKA_SSL_ENABLED", false)?,
            sasl_mechanism: std::env::var("KAFKA_SASL_MECHANISM").ok(),
            sasl_username: std::env::var("KAFKA_SASL_USERNAME").ok(),
            sasl_password: std::env::var("KAFKA_SASL_PASSWORD").ok(),
            ssl_ca_location: std::env::var("KAFKA_SSL_CA_LOCATION").ok(),
            admin_timeout_ms: env_or("KAFKA_ADMIN_TIMEOUT_MS", 10_000)?,
        })
    }

    /// Plaintext connection to `brokers` with defaults for everything else
    pub fn local(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            client_id: "courier".to_string(),
            acks: "all".to_string(),
            ssl_enabled: false,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            ssl_ca_location: None,
            admin_timeout_ms: 10_000,
        }
    }
}

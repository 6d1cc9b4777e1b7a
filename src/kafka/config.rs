use courier_config::{ConsumerConfig, KafkaConfig};
use rdkafka::config::ClientConfig;
use tracing::info;

/// Creates a new `rdkafka::config::ClientConfig` from the application's `KafkaConfig`.
///
/// Producers, consumers and the admin client all start from this so they
/// share the same connection and security settings.
///
/// It handles:
/// - Setting up bootstrap servers, client identity and acknowledgment mode.
/// - Enabling SSL/TLS if `ssl_enabled` is true.
/// - Configuring SASL authentication if a mechanism, username and password are provided.
pub fn create_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.brokers)
        .set("client.id", &config.client_id)
        .set("security.protocol", "plaintext");

    if config.ssl_enabled {
        info!("Enabling SSL/TLS for Kafka connection");
        client_config.set("security.protocol", "ssl");
        if let Some(ca) = &config.ssl_ca_location {
            client_config.set("ssl.ca.location", ca);
        }
    }

    if let (Some(mechanism), Some(username), Some(password)) = (
        &config.sasl_mechanism,
        &config.sasl_username,
        &config.sasl_password,
    ) {
        info!(sasl_mechanism = %mechanism, "Configuring SASL authentication");
        client_config
            .set("sasl.mechanism", mechanism)
            .set("sasl.username", username)
            .set("sasl.password", password)
            .set(
                "security.protocol",
                if config.ssl_enabled {
                    "sasl_ssl"
                } else {
                    "sasl_plaintext"
                },
            );
    }

    client_config
}

/// Producer view of the connection config
pub fn producer_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = create_client_config(config);
    client_config.set("acks", &config.acks);
    client_config
}

/// Consumer view of the connection config: the shared settings with the
/// consumer's group and offset-reset policy laid over them.
///
/// Offsets are committed manually, once a message is processed or
/// dead-lettered.
pub fn consumer_client_config(config: &KafkaConfig, consumer: &ConsumerConfig) -> ClientConfig {
    let mut client_config = create_client_config(config);
    client_config
        .set("group.id", &consumer.group_id)
        .set("auto.offset.reset", &consumer.auto_offset_reset)
        .set("enable.auto.commit", "false")
        .set("session.timeout.ms", "30000")
        .set("heartbeat.interval.ms", "3000")
        .set("max.poll.interval.ms", "300000");
    client_config
}

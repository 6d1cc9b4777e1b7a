// ============================================================================
// Courier Worker
// ============================================================================
//
// Consumes one topic through a resilient consumer:
//
// 1. Every message must be a JSON document; anything else fails the handler
// 2. Failing messages are retried up to COURIER_MAX_RETRIES times in total
// 3. Messages that still fail are moved to `{topic}_error`
// 4. With COURIER_OUTPUT_TOPIC set, valid documents are relayed there with
//    the incoming correlation headers
//
// The offset is committed once a message is processed or dead-lettered. If
// dead-lettering itself fails the worker exits without committing, and the
// message is redelivered on restart.
//
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use courier::{handler_fn, ResilientConsumer, ResilientProducer};
use courier_config::Config;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.logging.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Courier Worker Starting ===");
    info!("Kafka Brokers: {}", config.kafka.brokers);
    info!("Topic: {}", config.consumer.topic);
    info!("Consumer Group: {}", config.consumer.group_id);
    info!("Max Retries: {}", config.consumer.max_retries);
    match &config.producer {
        Some(producer) => info!("Relaying to: {}", producer.topic),
        None => info!("Relay disabled (COURIER_OUTPUT_TOPIC not set)"),
    }

    let relay = config
        .producer
        .clone()
        .map(|producer| ResilientProducer::<serde_json::Value>::kafka(&config.kafka, producer));

    let handler = handler_fn(move |ctx| {
        let document: serde_json::Value =
            ctx.json().context("Message value is not valid JSON")?;

        if let Some(relay) = &relay {
            relay
                .publish(&ctx.request, std::slice::from_ref(&document))
                .context("Failed to relay message")?;
        }
        Ok(())
    });

    let consumer = ResilientConsumer::kafka(&config.kafka, config.consumer.clone(), handler)
        .await
        .context("Failed to initialize Kafka admin client")?;

    // Shutdown flag, set on SIGTERM/Ctrl-C
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = shutdown.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            info!("SIGTERM received, initiating graceful shutdown...");
                        }
                        _ = tokio::signal::ctrl_c() => {
                            info!("SIGINT received, initiating graceful shutdown...");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to register SIGTERM handler");
                    tokio::signal::ctrl_c().await.ok();
                    info!("SIGINT received, initiating graceful shutdown...");
                }
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
            info!("Ctrl-C received, initiating graceful shutdown...");
        }
        shutdown_signal.store(true, Ordering::SeqCst);
    });

    consumer.run(&config.kafka, shutdown).await?;

    info!("=== Courier Worker Stopped ===");
    Ok(())
}

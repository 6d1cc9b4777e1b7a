use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

/// Messages handed to the broker by publish calls
pub static PUBLISH_ENQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "courier_publish_enqueued_total",
        "Total number of messages enqueued by publish calls"
    )
    .expect("Failed to register courier_publish_enqueued_total metric")
});

/// Publish calls aborted by a serialization or enqueue error
pub static PUBLISH_FAILURE: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "courier_publish_failure_total",
        "Total number of publish calls aborted before all payloads were enqueued"
    )
    .expect("Failed to register courier_publish_failure_total metric")
});

pub static DELIVERY_SUCCESS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "courier_delivery_success_total",
        "Total number of delivery reports confirming a write"
    )
    .expect("Failed to register courier_delivery_success_total metric")
});

pub static DELIVERY_FAILURE: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "courier_delivery_failure_total",
        "Total number of delivery reports for lost messages"
    )
    .expect("Failed to register courier_delivery_failure_total metric")
});

/// Messages whose handler eventually succeeded
pub static MESSAGES_PROCESSED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "courier_messages_processed_total",
        "Total number of consumed messages processed successfully"
    )
    .expect("Failed to register courier_messages_processed_total metric")
});

/// Every failed handler attempt, retried or not
pub static HANDLER_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "courier_handler_failures_total",
        "Total number of failed handler attempts"
    )
    .expect("Failed to register courier_handler_failures_total metric")
});

pub static MESSAGES_DEAD_LETTERED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "courier_messages_dead_lettered_total",
        "Total number of messages republished to a dead-letter topic"
    )
    .expect("Failed to register courier_messages_dead_lettered_total metric")
});

pub static DEAD_LETTER_FAILURE: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "courier_dead_letter_failure_total",
        "Total number of messages that could not be dead-lettered"
    )
    .expect("Failed to register courier_dead_letter_failure_total metric")
});

/// Kafka consumer errors counter
pub static CONSUME_FAILURE: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "courier_consume_failure_total",
        "Total number of Kafka consumer errors"
    )
    .expect("Failed to register courier_consume_failure_total metric")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        // Just ensure metrics can be accessed without panicking
        PUBLISH_ENQUEUED.inc();
        PUBLISH_FAILURE.inc();
        DELIVERY_SUCCESS.inc();
        DELIVERY_FAILURE.inc();
        MESSAGES_PROCESSED.inc();
        HANDLER_FAILURES.inc();
        MESSAGES_DEAD_LETTERED.inc();
        DEAD_LETTER_FAILURE.inc();
        CONSUME_FAILURE.inc();
    }
}

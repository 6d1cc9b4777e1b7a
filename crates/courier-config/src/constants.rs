// ============================================================================
// Constants
// ============================================================================

/// Suffix appended to a topic name to build its dead-letter topic.
///
/// Monitoring consumers subscribe to dead-letter topics by this name, so it
/// must not change.
pub const DEAD_LETTER_SUFFIX: &str = "_error";

/// Dead-letter topics are low volume: one partition keeps failures ordered.
pub const DEAD_LETTER_PARTITIONS: i32 = 1;
pub const DEAD_LETTER_REPLICATION_FACTOR: i32 = 1;

/// Bounded wait when releasing the short-lived dead-letter producer.
pub const DEAD_LETTER_FLUSH_TIMEOUT_MS: u64 = 1500;

/// Capacity of the per-publish delivery report channel.
pub const DELIVERY_REPORT_CAPACITY: usize = 10_000;

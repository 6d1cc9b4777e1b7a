// ============================================================================
// Logging Configuration
// ============================================================================

/// Logging settings.
///
/// `verbose` is handed to the consumer and producer constructors instead of
/// being read from the process environment at call sites.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub rust_log: String,
    /// Log per-message details (deliveries, handler attempts) at info level
    pub verbose: bool,
}

impl LoggingConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            verbose: std::env::var("LOG_VERBOSE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        }
    }
}

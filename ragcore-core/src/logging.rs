//! Structured logging initialization.

/// Initialize the global `tracing` subscriber from `RUST_LOG` (or `info` if unset).
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .map_err(|e| Box::<dyn std::error::Error>::from(e.to_string()))
}

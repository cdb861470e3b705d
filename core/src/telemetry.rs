// Logging bootstrap
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber from `RUST_LOG`, defaulting to
/// `info` for this crate. Safe to call more than once; later calls are
/// no-ops.
pub fn init_logging() {
    init_logging_with("courier_core=info");
}

/// Initializes the global tracing subscriber with an explicit default
/// filter, still overridable through `RUST_LOG`.
pub fn init_logging_with(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
    {
        info!("Logging initialized");
    }
}

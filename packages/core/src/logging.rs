use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging for the query tool.
///
/// Call once at startup, before any query is constructed. `RUST_LOG`
/// overrides the default `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Logging initialized");
}

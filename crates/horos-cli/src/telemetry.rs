use tracing_subscriber::EnvFilter;

/// One entry point for structured logging across every `horos-*` crate,
/// `RUST_LOG`-driven with a sane default when unset.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
    tracing::info!(service = service_name, "tracing initialized");
}

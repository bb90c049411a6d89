use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for binaries and tests.
///
/// Honours `RUST_LOG`; defaults to `info`. Later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

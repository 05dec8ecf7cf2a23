use tracing_subscriber::EnvFilter;

/// Initializes structured logging for a host process.
///
/// Filtering follows `RUST_LOG` and falls back to `info` when it is unset:
/// - `RUST_LOG=debug` shows every routed call and state commit
/// - `RUST_LOG=virtual_actor=trace` adds per-turn detail for the framework only
///
/// Calling it more than once is harmless; only the first call installs a subscriber.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

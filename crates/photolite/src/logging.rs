use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. `verbose` forces `debug`;
/// otherwise `RUST_LOG` wins over the configured level. Repeated calls are
/// ignored.
pub fn init(verbose: bool, configured_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(configured_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

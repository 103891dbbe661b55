//! Logging setup for the binary.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `level` is used as the filter.
/// Calling this twice is harmless: the second install is ignored.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the stderr subscriber used by the `oss-pulse` binary.
///
/// `RUST_LOG` wins over `default_level`. Calling this more than once is a no-op.
pub fn init_logging(default_level: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Routes pipeline logs through the libtest capture so they only show for failing tests.
pub fn init_test_logging() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

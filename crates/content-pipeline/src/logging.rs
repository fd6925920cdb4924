//! Tracing subscriber setup for hosts and tests

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber writing to stderr
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug or info for
/// this crate. Safe to call more than once: later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "content_pipeline=debug" } else { "content_pipeline=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Subscriber that routes output through the test harness capture
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("content_pipeline=debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test_tracing();
        init_tracing(true);
        init_tracing(false);
        tracing::debug!("still logging");
    }
}

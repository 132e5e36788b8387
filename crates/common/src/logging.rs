//! Logging setup.
//!
//! Thin wrappers over `tracing-subscriber` so binaries and tests initialize
//! logging the same way exactly once.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Initializes the global subscriber with an env-filter.
///
/// `default_directive` is used when `RUST_LOG` is unset (e.g. "testkit=info").
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(default_directive: Option<&str>) {
    LOGGING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive.unwrap_or("info")));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

/// Test variant: writes through the test writer so output is captured per
/// test, with debug-level defaults for the workspace crates.
pub fn ensure_test_logging(default_directive: Option<&str>) {
    LOGGING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(default_directive.unwrap_or("testkit_common=debug,testkit_harness=debug,testkit_graph=debug"))
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

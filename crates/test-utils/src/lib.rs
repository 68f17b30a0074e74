// crates/test-utils/src/lib.rs

pub mod task;

pub use task::TestTask;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests. Safe to call from every test; only the
/// first call installs the subscriber.
///
/// Uses `with_test_writer()`, so the harness captures output per-test and
/// only prints it for failing tests (unless run with `-- --nocapture`).
/// The scheduler logs most of its decisions at `debug`; enable them with
/// `RUST_LOG=stagecue=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

//! Tracing initialisation helpers for tests.
//!
//! Call [`init_test_tracing`] at the top of any test that emits tracing events
//! and wants them shown by the test harness. Use [`capture_diagnostics`] when
//! the test asserts on the events themselves.

use caseassist_core::logging::{DiagnosticsCollector, DiagnosticsReader};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialise a tracing subscriber that writes to the test-harness writer
/// and respects the `RUST_LOG` environment variable.
///
/// Safe to call multiple times; later calls are ignored.
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     caseassist_test_utils::tracing_setup::init_test_tracing();
///     tracing::info!("visible when RUST_LOG=info");
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Install a thread-local subscriber capturing every event.
///
/// Events are captured while the guard lives. Use a current-thread runtime
/// (the `#[tokio::test]` default) so spawned tasks log on the same thread.
pub fn capture_diagnostics() -> (DiagnosticsReader, DefaultGuard) {
    let collector = DiagnosticsCollector::new(1024);
    let reader = collector.reader();
    let guard = tracing_subscriber::registry().with(collector).set_default();
    (reader, guard)
}

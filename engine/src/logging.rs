//! Development-time tracing for debugging episodes.
//!
//! Diagnostics only: output goes to stderr via `RUST_LOG`, is not persisted,
//! and is not part of any engine contract. Step audit records ([`StepInfo`])
//! are the product-facing trace.
//!
//! [`StepInfo`]: crate::episode::StepInfo

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for development logging.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset. Output: stderr, compact
/// format.
///
/// # Example
/// ```bash
/// RUST_LOG=engine=debug cargo run -p trainer -- episode
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

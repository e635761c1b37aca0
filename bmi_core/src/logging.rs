//! Logging setup shared by the BMI tracker binaries.
//!
//! Log lines go to stderr so stdout only carries command output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at `warn`, the quiet default for interactive use
pub fn init() {
    init_with_level("warn")
}

/// Initialize logging with a specific default level
///
/// `RUST_LOG` still takes precedence when set.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Initialize logging for tests (captured per test)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}

//! Tracing setup for the `pillbox` binary.
//!
//! Log lines go to stderr so that command output on stdout can be piped or
//! matched in tests. `RUST_LOG` always wins over the level chosen here.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the subscriber at the default `info` level
pub fn init() {
    init_with_level("info")
}

/// Install the subscriber with `default_level` (for example `debug` under
/// `--verbose`) unless `RUST_LOG` is set
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .init();
}

/// Route logs through the test harness; safe to call from every test
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}

//! Tracing initialization.

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` takes precedence; the crate
/// defaults to `info`.
pub fn init() {
    // Static directive strings are guaranteed to parse successfully
    #[allow(clippy::unwrap_used)]
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("separation_server=info".parse().unwrap()),
        )
        .init();
}

//! Logging setup for the wxconv binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,wxconv=debug";

/// Filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`]
pub fn env_filter() -> EnvFilter {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    EnvFilter::new(directives)
}

/// Install a JSON subscriber writing to stderr
///
/// stdout is left for command output. Calling this twice keeps the first
/// subscriber.
pub fn init(service_name: &str) {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %service_name, "Observability initialized");
    }
}

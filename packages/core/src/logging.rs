//! Tracing setup shared by the server and the one-shot CLI commands.

use tracing_subscriber::{fmt, EnvFilter};

/// Used when `RUST_LOG` is unset or unparsable. sqlx logs every statement
/// at info.
const DEFAULT_FILTER: &str = "info,sqlx=warn";

fn filter_from(raw: Option<&str>) -> EnvFilter {
    raw.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Call once, first thing in `main`.
pub fn init_logging() {
    let filter = filter_from(std::env::var("RUST_LOG").ok().as_deref());

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();

    if installed.is_ok() {
        tracing::info!("Logging initialized");
    }
}

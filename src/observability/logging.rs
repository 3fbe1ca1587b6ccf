//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Honor `RUST_LOG` when set, the configured level otherwise
//!
//! # Design Decisions
//! - Uses the tracing crate for structured key/value events
//! - Human-readable fmt layer; fields carry the machine-readable parts

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: `level` for this crate, warnings
/// for dependencies.
pub fn default_filter(level: &str) -> String {
    format!("warn,openapi_route_locator={}", level)
}

/// Install the global subscriber.
pub fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!
//! Refresher produces:
//!     → metrics.rs (MetricsSink: per-source outcomes, per-cycle reports)
//!     → Prometheus scrape endpoint when enabled
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (source, stage, generation)
//! - Metrics are cheap and optional

pub mod logging;
pub mod metrics;

pub use self::metrics::{MetricsSink, PrometheusMetrics};

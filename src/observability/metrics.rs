//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the `MetricsSink` seam the refresher reports through
//! - Record refresh outcomes with the `metrics` facade
//! - Expose a Prometheus scrape endpoint
//!
//! # Metrics
//! - `openapi_route_definition_locator_openapi_definition_updates` (histogram):
//!   duration of one source refresh, labelled `upstream_service`,
//!   `update_result` and `update_result_detailed`
//! - `openapi_route_definition_locator_routes_count` (gauge): routes in the
//!   published snapshot
//! - `openapi_route_definition_locator_shadowed_routes` (gauge): routes
//!   hidden by collisions in the current snapshot
//! - `openapi_route_definition_locator_newly_shadowed_routes_total` (counter):
//!   routes that became shadowed since the previous cycle's snapshot
//! - `openapi_route_definition_locator_refresh_cycles_total` (counter)
//!
//! # Design Decisions
//! - The sink is optional and injected; nothing requires a recorder
//! - Without an installed recorder the macros are no-ops

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::refresh::report::{CycleReport, SourceOutcome};

pub const DEFINITION_UPDATES: &str = "openapi_route_definition_locator_openapi_definition_updates";
pub const ROUTES_COUNT: &str = "openapi_route_definition_locator_routes_count";
pub const SHADOWED_ROUTES: &str = "openapi_route_definition_locator_shadowed_routes";
pub const NEWLY_SHADOWED_ROUTES: &str = "openapi_route_definition_locator_newly_shadowed_routes_total";
pub const REFRESH_CYCLES: &str = "openapi_route_definition_locator_refresh_cycles_total";

/// Receives refresh telemetry.
pub trait MetricsSink: Send + Sync {
    /// Called as soon as one source's refresh completes.
    fn record_source(&self, outcome: &SourceOutcome);

    /// Called once per completed cycle.
    fn record_cycle(&self, report: &CycleReport);
}

/// Sink that records through the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl MetricsSink for PrometheusMetrics {
    fn record_source(&self, outcome: &SourceOutcome) {
        histogram!(
            DEFINITION_UPDATES,
            "upstream_service" => outcome.source_id.clone(),
            "update_result" => outcome.result.as_str(),
            "update_result_detailed" => outcome.result.detailed_str(),
        )
        .record(outcome.elapsed.as_secs_f64());
    }

    fn record_cycle(&self, report: &CycleReport) {
        counter!(REFRESH_CYCLES).increment(1);
        gauge!(ROUTES_COUNT).set(report.route_count as f64);
        gauge!(SHADOWED_ROUTES).set(report.shadowed_count as f64);
        counter!(NEWLY_SHADOWED_ROUTES).increment(report.newly_shadowed as u64);
    }
}

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_histogram!(
        DEFINITION_UPDATES,
        metrics::Unit::Seconds,
        "Duration of OpenAPI definition refreshes per upstream service"
    );
    describe_gauge!(ROUTES_COUNT, "Routes in the published snapshot");
    describe_gauge!(SHADOWED_ROUTES, "Routes hidden by higher-priority sources");
    describe_counter!(
        NEWLY_SHADOWED_ROUTES,
        "Routes that became shadowed since the previous snapshot"
    );
    describe_counter!(REFRESH_CYCLES, "Completed refresh cycles");

    tracing::info!(address = %addr, "Prometheus metrics listener started");
    Ok(())
}

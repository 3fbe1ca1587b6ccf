//! End-to-end refresh tests against mock document servers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use openapi_route_locator::cache::SourceStatus;
use openapi_route_locator::config::DefinitionConfig;
use openapi_route_locator::fetch::FetchError;
use openapi_route_locator::lifecycle::build_locator;
use openapi_route_locator::pipeline::{FailureCause, Stage};
use openapi_route_locator::refresh::UpdateResult;
use openapi_route_locator::routing::{Diagnostic, HttpMethod};

mod common;
use common::{MockResponse, LEGACY_ORDERS_DOC, ORDERS_DOC, USERS_DOC};

#[tokio::test]
async fn test_empty_snapshot_before_first_cycle() {
    let addr = common::start_document_server(MockResponse::yaml(ORDERS_DOC)).await;
    let components = build_locator(&common::config(vec![common::service("orders", addr)])).unwrap();

    let snapshot = components.locator.current_routes();
    assert_eq!(snapshot.version, 0);
    assert!(snapshot.is_empty());
    assert!(components.locator.find(HttpMethod::Get, "/orders").is_none());
    assert_eq!(components.locator.sources()[0].status, SourceStatus::Pending);
}

#[tokio::test]
async fn test_operation_round_trip_under_base_path() {
    let addr = common::start_document_server(MockResponse::yaml(ORDERS_DOC)).await;
    let mut orders = common::service("orders", addr);
    orders.route_settings.base_path = Some("/api".into());
    orders
        .route_settings
        .filters
        .push(DefinitionConfig::Shortcut("StripPrefix=1".into()));

    let components = build_locator(&common::config(vec![orders])).unwrap();
    let report = components.refresher.run_cycle().await;
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[0].result, UpdateResult::SuccessWithRouteChanges);

    let route = components
        .locator
        .find(HttpMethod::Get, "/api/orders/42")
        .expect("route for GET /api/orders/42");
    assert_eq!(route.id, "orders:GET:/api/orders/{id}");
    assert_eq!(route.target_uri.as_str(), format!("http://{}/", addr));
    assert_eq!(route.filters[0].to_string(), "StripPrefix=1");

    assert!(components.locator.find(HttpMethod::Get, "/orders/42").is_none());
    assert!(components.locator.find(HttpMethod::Delete, "/api/orders/42").is_none());

    let snapshot = components.locator.current_routes();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.generations["orders"], 1);
}

#[tokio::test]
async fn test_collision_prefers_earlier_source() {
    let orders = common::start_document_server(MockResponse::yaml(ORDERS_DOC)).await;
    let legacy = common::start_document_server(MockResponse::json(LEGACY_ORDERS_DOC)).await;

    let components = build_locator(&common::config(vec![
        common::service("orders", orders),
        common::service("legacy-orders", legacy),
    ]))
    .unwrap();
    components.refresher.run_cycle().await;

    let snapshot = components.locator.current_routes();
    let route = snapshot.find(HttpMethod::Get, "/orders/7").unwrap();
    assert_eq!(route.source_id, "orders");

    assert_eq!(
        snapshot.shadowed,
        vec![Diagnostic::ShadowedRoute {
            route_id: "legacy-orders:GET:/orders/{orderId}".into(),
            source_id: "legacy-orders".into(),
            shadowed_by: "orders".into(),
        }]
    );

    let history = snapshot.find(HttpMethod::Get, "/orders/7/history").unwrap();
    assert_eq!(history.source_id, "legacy-orders");
}

#[tokio::test]
async fn test_failing_source_is_isolated() {
    let orders = common::start_document_server(MockResponse::yaml(ORDERS_DOC)).await;
    let broken = common::start_document_server(MockResponse::status(500)).await;
    let html = common::start_document_server(
        MockResponse::yaml("<html></html>").with_content_type("text/html"),
    )
    .await;

    let components = build_locator(&common::config(vec![
        common::service("orders", orders),
        common::service("broken", broken),
        common::service("html", html),
    ]))
    .unwrap();
    let report = components.refresher.run_cycle().await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.failed_by_stage()[&Stage::Fetch], 2);

    let broken = report.outcome("broken").unwrap();
    assert_eq!(
        broken.failure.as_ref().unwrap().cause,
        FailureCause::Fetch(FetchError::HttpStatus(500))
    );
    assert_eq!(broken.result, UpdateResult::FailureRetrieval);

    let html = report.outcome("html").unwrap();
    assert_eq!(
        html.failure.as_ref().unwrap().cause,
        FailureCause::Fetch(FetchError::UnsupportedContentType("text/html".into()))
    );

    let snapshot = components.locator.current_routes();
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot.routes.iter().all(|r| r.source_id == "orders"));
}

#[tokio::test]
async fn test_slow_source_times_out_without_blocking_others() {
    let slow = common::start_document_server(
        MockResponse::yaml(USERS_DOC).delayed(Duration::from_secs(5)),
    )
    .await;
    let fast = common::start_document_server(MockResponse::yaml(ORDERS_DOC)).await;

    let mut users = common::service("users", slow);
    users.timeout_ms = Some(2000);
    let components = build_locator(&common::config(vec![
        users,
        common::service("orders", fast),
    ]))
    .unwrap();

    let refresher = components.refresher.clone();
    let started = Instant::now();
    let cycle = tokio::spawn(async move { refresher.run_cycle().await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    let midway = components.locator.current_routes();
    assert_eq!(midway.len(), 3, "fast source published while slow one is pending");
    assert_eq!(midway.generations["users"], 0);

    let report = cycle.await.unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1900), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "elapsed {:?}", elapsed);

    let users = report.outcome("users").unwrap();
    let failure = users.failure.as_ref().unwrap();
    assert_eq!(failure.stage, Stage::Fetch);
    assert_eq!(failure.cause, FailureCause::Fetch(FetchError::Timeout));
    assert_eq!(report.outcome("orders").unwrap().result, UpdateResult::SuccessWithRouteChanges);
}

#[tokio::test]
async fn test_stale_routes_survive_failures_and_recover() {
    let healthy = Arc::new(AtomicBool::new(true));
    let flag = healthy.clone();
    let addr = common::start_programmable_server(move |_path| {
        let ok = flag.load(Ordering::SeqCst);
        async move {
            if ok {
                MockResponse::yaml(ORDERS_DOC)
            } else {
                MockResponse::status(503)
            }
        }
    })
    .await;

    let components = build_locator(&common::config(vec![common::service("orders", addr)])).unwrap();
    components.refresher.run_cycle().await;
    let first = components.locator.current_routes();
    assert_eq!(first.len(), 3);

    healthy.store(false, Ordering::SeqCst);
    let report = components.refresher.run_cycle().await;
    assert_eq!(report.failed(), 1);
    let set = &components.locator.sources()[0];
    assert_eq!(set.status, SourceStatus::StaleOnError);
    assert!(set.failing_since.is_some());

    let stale = components.locator.current_routes();
    assert_eq!(stale.version, first.version);
    assert_eq!(stale.routes, first.routes);

    healthy.store(true, Ordering::SeqCst);
    let report = components.refresher.run_cycle().await;
    assert_eq!(
        report.outcomes[0].result,
        UpdateResult::SuccessWithoutRouteChanges
    );
    let set = &components.locator.sources()[0];
    assert_eq!(set.status, SourceStatus::Fresh);
    assert_eq!(set.generation, 2);
}

#[tokio::test]
async fn test_output_is_deterministic() {
    let orders = common::start_document_server(MockResponse::yaml(ORDERS_DOC)).await;
    let legacy = common::start_document_server(MockResponse::json(LEGACY_ORDERS_DOC)).await;
    let users = common::start_document_server(MockResponse::yaml(USERS_DOC)).await;

    let mut rendered = Vec::new();
    for _ in 0..2 {
        let components = build_locator(&common::config(vec![
            common::service("orders", orders),
            common::service("legacy-orders", legacy),
            common::service("users", users),
        ]))
        .unwrap();
        components.refresher.run_cycle().await;
        let snapshot = components.locator.current_routes();
        rendered.push(serde_json::to_string(&snapshot.routes).unwrap());
    }
    assert_eq!(rendered[0], rendered[1]);
}

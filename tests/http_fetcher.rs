//! HTTP document fetcher against a raw TCP mock server.

use std::time::Duration;

use url::Url;

use openapi_route_locator::config::FetchConfig;
use openapi_route_locator::fetch::{DocumentFetcher, FetchError, HttpFetcher};

mod common;
use common::{MockResponse, ORDERS_DOC};

fn url(addr: std::net::SocketAddr) -> Url {
    Url::parse(&format!("http://{}/internal/openapi-definition", addr)).unwrap()
}

#[tokio::test]
async fn test_fetches_document_with_content_type() {
    let addr = common::start_programmable_server(|path| async move {
        if path == "/internal/openapi-definition" {
            MockResponse::yaml(ORDERS_DOC)
        } else {
            MockResponse::status(404)
        }
    })
    .await;

    let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
    let doc = fetcher.fetch(&url(addr), Duration::from_secs(2)).await.unwrap();
    assert_eq!(doc.bytes, ORDERS_DOC.as_bytes());
    assert_eq!(doc.content_type.as_deref(), Some("application/yaml"));
}

#[tokio::test]
async fn test_non_success_status() {
    let addr = common::start_document_server(MockResponse::status(404)).await;
    let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
    assert_eq!(
        fetcher.fetch(&url(addr), Duration::from_secs(2)).await,
        Err(FetchError::HttpStatus(404))
    );
}

#[tokio::test]
async fn test_rejects_html() {
    let addr = common::start_document_server(
        MockResponse::yaml("<html>login</html>").with_content_type("text/html; charset=utf-8"),
    )
    .await;
    let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
    assert_eq!(
        fetcher.fetch(&url(addr), Duration::from_secs(2)).await,
        Err(FetchError::UnsupportedContentType("text/html; charset=utf-8".into()))
    );
}

#[tokio::test]
async fn test_document_size_limit() {
    let addr = common::start_document_server(MockResponse::yaml(ORDERS_DOC)).await;
    let fetcher = HttpFetcher::new(&FetchConfig {
        max_document_bytes: 32,
        ..FetchConfig::default()
    })
    .unwrap();
    assert_eq!(
        fetcher.fetch(&url(addr), Duration::from_secs(2)).await,
        Err(FetchError::DocumentTooLarge { limit: 32 })
    );
}

#[tokio::test]
async fn test_timeout() {
    let addr = common::start_document_server(
        MockResponse::yaml(ORDERS_DOC).delayed(Duration::from_secs(3)),
    )
    .await;
    let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
    assert_eq!(
        fetcher.fetch(&url(addr), Duration::from_millis(200)).await,
        Err(FetchError::Timeout)
    );
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
    let result = fetcher.fetch(&url(addr), Duration::from_secs(2)).await;
    assert!(matches!(result, Err(FetchError::ConnectionRefused(_))), "{:?}", result);
}

//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use openapi_route_locator::config::{LocatorConfig, RouteSettingsConfig, ServiceConfig};

/// Canned response of the mock document server.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
    pub delay: Duration,
}

impl MockResponse {
    pub fn yaml(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/yaml"),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            content_type: Some("application/json"),
            ..Self::yaml(body)
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: Some("text/plain"),
            ..Self::yaml("error")
        }
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Start a mock server on an ephemeral port that always returns `response`.
pub async fn start_document_server(response: MockResponse) -> SocketAddr {
    start_programmable_server(move |_path| {
        let response = response.clone();
        async move { response }
    })
    .await
}

/// Start a programmable mock server. The closure receives the request path.
pub async fn start_programmable_server<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let path = read_request_path(&mut socket).await.unwrap_or_default();
                        let response = f(path).await;
                        tokio::time::sleep(response.delay).await;

                        let status_text = match response.status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let content_type = response
                            .content_type
                            .map(|ct| format!("Content-Type: {}\r\n", ct))
                            .unwrap_or_default();
                        let raw = format!(
                            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            content_type,
                            response.body.len(),
                            response.body
                        );
                        let _ = socket.write_all(raw.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    head.split_whitespace().nth(1).map(str::to_string)
}

pub fn service(id: &str, addr: SocketAddr) -> ServiceConfig {
    ServiceConfig {
        id: id.into(),
        uri: format!("http://{}", addr),
        openapi_definition_uri: None,
        timeout_ms: None,
        route_settings: RouteSettingsConfig::default(),
    }
}

/// Configuration with fast retries suitable for tests.
pub fn config(services: Vec<ServiceConfig>) -> LocatorConfig {
    let mut config = LocatorConfig::default();
    config.scheduler.retry_base_delay_ms = 10;
    config.scheduler.retry_max_delay_ms = 20;
    config.services = services;
    config
}

pub const ORDERS_DOC: &str = r#"
openapi: 3.0.3
info:
  title: Orders
  version: "1.0"
paths:
  /orders:
    get:
      operationId: listOrders
    post:
      operationId: createOrder
  /orders/{id}:
    get:
      operationId: getOrder
"#;

pub const LEGACY_ORDERS_DOC: &str = r#"{
  "openapi": "3.0.1",
  "info": { "title": "Legacy orders", "version": "0.9" },
  "paths": {
    "/orders/{orderId}": { "get": { "operationId": "fetchOrder" } },
    "/orders/{orderId}/history": { "get": {} }
  }
}"#;

pub const USERS_DOC: &str = r#"
openapi: 3.1.0
info:
  title: Users
  version: "2"
paths:
  /users/{id}:
    get: {}
"#;

//! Document retrieval subsystem.
//!
//! # Data Flow
//! ```text
//! RouteSource.document_url + timeout
//!     → DocumentFetcher (one GET / one file read, no retries)
//!     → FetchedDocument { bytes, content_type } or FetchError
//! ```
//!
//! # Design Decisions
//! - The fetcher is a trait so pipelines can be driven by test doubles
//! - Retries belong to the refresher, never to the fetcher
//! - Bodies are size-capped while streaming

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use http::HttpFetcher;

/// Failures while retrieving a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The source did not answer within its timeout.
    #[error("timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The source answered with a non-2xx status.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),

    #[error("document exceeds {limit} bytes")]
    DocumentTooLarge { limit: usize },

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
}

impl FetchError {
    /// Whether another attempt within the same cycle may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::ConnectionRefused(_) | FetchError::Transport(_) => true,
            FetchError::HttpStatus(code) => *code == 429 || *code >= 500,
            FetchError::UnsupportedContentType(_)
            | FetchError::DocumentTooLarge { .. }
            | FetchError::UnsupportedScheme(_) => false,
        }
    }
}

/// Raw document as retrieved from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    /// `Content-Type` header, if the transport reports one.
    pub content_type: Option<String>,
}

/// Retrieves the raw bytes of one source's document.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch `url`, giving up after `timeout`.
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedDocument, FetchError>;
}

/// Content types that may carry an OpenAPI document.
pub fn is_supported_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.is_empty()
        || essence.ends_with("json")
        || essence.ends_with("yaml")
        || essence.starts_with("application/vnd.oai.openapi")
        || essence == "text/plain"
        || essence == "application/octet-stream"
}

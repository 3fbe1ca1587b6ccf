//! HTTP(S) and file document fetcher.
//!
//! # Responsibilities
//! - One GET per call with the caller's timeout
//! - Follow redirects and verify TLS (reqwest defaults)
//! - Reject non-2xx statuses and unrecognized content types
//! - Read `file:` URLs from disk

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::config::schema::FetchConfig;
use crate::fetch::{is_supported_content_type, DocumentFetcher, FetchError, FetchedDocument};

const ACCEPT_DOCUMENT: &str =
    "application/json, application/yaml, application/x-yaml, text/yaml, text/plain;q=0.9, */*;q=0.1";

/// Fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_document_bytes: usize,
}

impl HttpFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            max_document_bytes: config.max_document_bytes,
        })
    }

    async fn fetch_http(&self, url: &Url, timeout: Duration) -> Result<FetchedDocument, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_DOCUMENT)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(content_type) = &content_type {
            if !is_supported_content_type(content_type) {
                return Err(FetchError::UnsupportedContentType(content_type.clone()));
            }
        }

        let limit = self.max_document_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::DocumentTooLarge { limit });
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            if bytes.len() + chunk.len() > limit {
                return Err(FetchError::DocumentTooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedDocument {
            bytes,
            content_type,
        })
    }

    async fn fetch_file(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|_| FetchError::Transport(format!("invalid file URL '{}'", url)))?;

        let limit = self.max_document_bytes;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FetchError::Transport(format!("{}: {}", path.display(), e)))?;
        if metadata.len() > limit as u64 {
            return Err(FetchError::DocumentTooLarge { limit });
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| FetchError::Transport(format!("{}: {}", path.display(), e)))?;

        Ok(FetchedDocument {
            bytes,
            content_type: None,
        })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedDocument, FetchError> {
        tracing::debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "Fetching OpenAPI document");

        match url.scheme() {
            "http" | "https" => self.fetch_http(url, timeout).await,
            "file" => tokio::time::timeout(timeout, self.fetch_file(url))
                .await
                .map_err(|_| FetchError::Timeout)?,
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::ConnectionRefused(e.to_string())
    } else {
        FetchError::Transport(e.to_string())
    }
}

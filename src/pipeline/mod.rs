//! Per-source pipeline: fetch, parse, build.
//!
//! # Data Flow
//! ```text
//! RouteSource
//!     → fetch (DocumentFetcher, transient failures retried with backoff)
//!     → parse (parse_document)
//!     → build (RouteBuilder)
//!     → PipelineResult { routes, diagnostics } or PipelineFailure { stage, cause }
//! ```
//!
//! # Design Decisions
//! - Stages run strictly in order and short-circuit on the first failure
//! - A run never yields partial routes
//! - The refresher imposes the hard deadline; fetch attempts split it so a
//!   timed-out attempt can still be retried before it expires

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::fetch::{DocumentFetcher, FetchError};
use crate::openapi::{parse_document, ParseError};
use crate::resilience::RetryPolicy;
use crate::routing::{BuildError, Diagnostic, RouteBuilder, RouteDefinition};
use crate::source::RouteSource;

/// Pipeline stage at which a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Parse,
    Build,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Build => "build",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying error of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {cause}")]
pub struct PipelineFailure {
    pub stage: Stage,
    pub cause: FailureCause,
}

impl From<FailureCause> for PipelineFailure {
    fn from(cause: FailureCause) -> Self {
        let stage = match cause {
            FailureCause::Fetch(_) => Stage::Fetch,
            FailureCause::Parse(_) => Stage::Parse,
            FailureCause::Build(_) => Stage::Build,
        };
        Self { stage, cause }
    }
}

macro_rules! stage_failure_from {
    ($($error:ty),*) => {
        $(impl From<$error> for PipelineFailure {
            fn from(e: $error) -> Self {
                FailureCause::from(e).into()
            }
        })*
    };
}

stage_failure_from!(FetchError, ParseError, BuildError);

impl PipelineFailure {
    /// A run cut off by the source's hard timeout.
    pub fn timeout() -> Self {
        FetchError::Timeout.into()
    }
}

/// Successful run output for one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineResult {
    pub routes: Vec<RouteDefinition>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs fetch → parse → build for one source at a time.
#[derive(Clone)]
pub struct SourcePipeline {
    fetcher: Arc<dyn DocumentFetcher>,
    builder: RouteBuilder,
    retry: RetryPolicy,
}

impl SourcePipeline {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, builder: RouteBuilder) -> Self {
        Self {
            fetcher,
            builder,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn run(&self, source: &RouteSource) -> Result<PipelineResult, PipelineFailure> {
        let deadline = Instant::now() + source.timeout;
        let budget = self.retry.attempt_budget(source.timeout);
        let document = self
            .retry
            .run(
                |attempt| {
                    let timeout = budget.min(deadline.saturating_duration_since(Instant::now()));
                    tracing::trace!(
                        source = %source.id,
                        attempt,
                        timeout_ms = timeout.as_millis() as u64,
                        "Fetch attempt"
                    );
                    self.fetcher.fetch(&source.document_url, timeout)
                },
                FetchError::is_transient,
            )
            .await?;

        let api = parse_document(&document.bytes, &source.document_url)?;
        tracing::debug!(
            source = %source.id,
            title = %api.title,
            openapi = %api.openapi_version,
            operations = api.operation_count(),
            "Parsed OpenAPI document"
        );

        let output = self.builder.build(source, &api)?;

        Ok(PipelineResult {
            routes: output.routes,
            diagnostics: output.diagnostics,
        })
    }
}

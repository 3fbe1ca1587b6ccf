//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a loaded configuration into wired components
//! - Build in dependency order: registry, fetcher, pipeline, cache, refresher
//!
//! # Design Decisions
//! - Fail fast: an invalid configuration is fatal
//! - Explicit wiring; the fetcher, customizers and metrics sink are injectable
//! - Nothing is fetched here; the refresher's first cycle does that

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::RouteCache;
use crate::config::{ConfigError, LocatorConfig};
use crate::fetch::{DocumentFetcher, FetchError, HttpFetcher};
use crate::locator::Locator;
use crate::observability::metrics::MetricsSink;
use crate::pipeline::SourcePipeline;
use crate::refresh::Refresher;
use crate::resilience::RetryPolicy;
use crate::routing::{RouteBuilder, RouteCustomizer};
use crate::source::SourceRegistry;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create document fetcher: {0}")]
    Fetcher(#[from] FetchError),
}

/// Everything a running locator consists of.
pub struct Components {
    pub registry: Arc<SourceRegistry>,
    pub locator: Locator,
    pub refresher: Arc<Refresher>,
}

/// Optional collaborators; defaults are an HTTP fetcher, no customizers and
/// no metrics.
#[derive(Default)]
pub struct Extensions {
    pub fetcher: Option<Arc<dyn DocumentFetcher>>,
    pub customizers: Vec<Arc<dyn RouteCustomizer>>,
    pub metrics: Option<Arc<dyn MetricsSink>>,
}

/// Wire a locator from configuration with default collaborators.
pub fn build_locator(config: &LocatorConfig) -> Result<Components, StartupError> {
    build_locator_with(config, Extensions::default())
}

pub fn build_locator_with(
    config: &LocatorConfig,
    extensions: Extensions,
) -> Result<Components, StartupError> {
    let registry = Arc::new(SourceRegistry::from_config(config)?);

    let fetcher: Arc<dyn DocumentFetcher> = match extensions.fetcher {
        Some(fetcher) => fetcher,
        None => Arc::new(HttpFetcher::new(&config.fetch)?),
    };

    let pipeline = Arc::new(
        SourcePipeline::new(fetcher, RouteBuilder::new(extensions.customizers))
            .with_retry(RetryPolicy::from_config(&config.scheduler)),
    );

    let cache = Arc::new(RouteCache::new(
        &registry,
        Duration::from_secs(config.scheduler.max_staleness_secs),
    ));

    let mut refresher = Refresher::new(
        registry.clone(),
        pipeline,
        cache.clone(),
        Duration::from_secs(config.scheduler.refresh_interval_secs),
    );
    if let Some(metrics) = extensions.metrics {
        refresher = refresher.with_metrics(metrics);
    }

    let locator = Locator::new(cache, refresher.handle());

    tracing::info!(
        sources = registry.len(),
        refresh_interval_secs = config.scheduler.refresh_interval_secs,
        max_staleness_secs = config.scheduler.max_staleness_secs,
        "Locator initialized"
    );

    Ok(Components {
        registry,
        locator,
        refresher: Arc::new(refresher),
    })
}

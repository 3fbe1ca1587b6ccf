//! Source registry.
//!
//! # Responsibilities
//! - Turn validated service configuration into immutable route sources
//! - Resolve each service's document URL against its base URI
//! - Preserve declaration order as the collision priority rank

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::{LocatorConfig, ServiceConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::source::options::ConversionOptions;

/// A backend service whose OpenAPI document drives route generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSource {
    /// Unique, stable identifier.
    pub id: String,
    /// Declaration order; lower wins route collisions.
    pub rank: usize,
    /// Base URI of the service, the forwarding target of last resort.
    pub base_uri: Url,
    /// Where the OpenAPI document is fetched from.
    pub document_url: Url,
    /// Hard timeout for one pipeline run.
    pub timeout: Duration,
    pub options: ConversionOptions,
}

impl RouteSource {
    fn from_config(
        rank: usize,
        service: &ServiceConfig,
        config: &LocatorConfig,
    ) -> Result<Self, ValidationError> {
        let field = format!("services[{}]", rank);
        let invalid = |name: &str, uri: &str| ValidationError::InvalidUri {
            field: format!("{}.{}", field, name),
            uri: uri.to_string(),
            reason: "cannot be resolved",
        };

        let base_uri = Url::parse(&service.uri).map_err(|_| invalid("uri", &service.uri))?;
        let definition_uri = service
            .openapi_definition_uri
            .as_deref()
            .unwrap_or(&config.openapi_definition_uri);
        let document_url = base_uri
            .join(definition_uri)
            .map_err(|_| invalid("openapi_definition_uri", definition_uri))?;

        let timeout_ms = service
            .timeout_ms
            .unwrap_or(config.scheduler.source_timeout_ms);

        Ok(Self {
            id: service.id.clone(),
            rank,
            base_uri,
            document_url,
            timeout: Duration::from_millis(timeout_ms),
            options: ConversionOptions::layered(
                &config.default_route_settings,
                &service.route_settings,
                &format!("{}.route_settings", field),
            )?,
        })
    }
}

/// Ordered, immutable set of route sources. Loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<RouteSource>>,
}

impl SourceRegistry {
    /// Validate the configuration and build the registry.
    ///
    /// An invalid source list is fatal: the locator must not start with it.
    pub fn from_config(config: &LocatorConfig) -> Result<Self, ConfigError> {
        validate_config(config)?;

        let sources = config
            .services
            .iter()
            .enumerate()
            .map(|(rank, service)| RouteSource::from_config(rank, service, config).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Validation(vec![e]))?;

        tracing::info!(sources = sources.len(), "Source registry loaded");
        for source in &sources {
            tracing::debug!(
                source = %source.id,
                rank = source.rank,
                document_url = %source.document_url,
                timeout_ms = source.timeout.as_millis() as u64,
                "Registered route source"
            );
        }

        Ok(Self { sources })
    }

    /// Build a registry from already-constructed sources. Ranks are
    /// reassigned from the given order.
    pub fn from_sources(sources: Vec<RouteSource>) -> Self {
        let sources = sources
            .into_iter()
            .enumerate()
            .map(|(rank, mut source)| {
                source.rank = rank;
                Arc::new(source)
            })
            .collect();
        Self { sources }
    }

    pub fn sources(&self) -> &[Arc<RouteSource>] {
        &self.sources
    }

    pub fn get(&self, id: &str) -> Option<&Arc<RouteSource>> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

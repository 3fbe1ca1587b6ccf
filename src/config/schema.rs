//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the locator.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default location of a service's OpenAPI document, relative to its base URI.
pub const DEFAULT_OPENAPI_DEFINITION_URI: &str = "/internal/openapi-definition";

/// Root configuration for the route locator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// URI of the OpenAPI document, relative to each service's base URI
    /// unless absolute. Services may override it.
    pub openapi_definition_uri: String,

    /// Refresh scheduling, timeouts and staleness policy.
    pub scheduler: SchedulerConfig,

    /// Document retrieval limits.
    pub fetch: FetchConfig,

    /// Settings applied to the routes of every service.
    pub default_route_settings: RouteSettingsConfig,

    /// Registered services, in priority order (first wins on collisions).
    pub services: Vec<ServiceConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            openapi_definition_uri: DEFAULT_OPENAPI_DEFINITION_URI.to_string(),
            scheduler: SchedulerConfig::default(),
            fetch: FetchConfig::default(),
            default_route_settings: RouteSettingsConfig::default(),
            services: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// A backend service publishing an OpenAPI document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique, stable identifier of the service.
    pub id: String,

    /// Base URI of the service (e.g., "http://orders:8080").
    pub uri: String,

    /// Overrides `LocatorConfig::openapi_definition_uri` for this service.
    #[serde(default)]
    pub openapi_definition_uri: Option<String>,

    /// Overrides `SchedulerConfig::source_timeout_ms` for this service.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Settings applied to all routes of this service.
    #[serde(default)]
    pub route_settings: RouteSettingsConfig,
}

/// Per-route conversion knobs. Used both globally and per service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouteSettingsConfig {
    /// Prefix prepended to every operation path (e.g., "/api").
    pub base_path: Option<String>,

    /// Forward to this URI instead of the document's declared server.
    pub target_uri: Option<String>,

    /// Filters attached to every route, in order.
    pub filters: Vec<DefinitionConfig>,

    /// Predicates attached to every route in addition to path and method.
    pub predicates: Vec<DefinitionConfig>,

    /// Metadata attached to every route. Deep-merged, service over global.
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Route order, used when the operation does not declare one.
    pub order: Option<i32>,

    /// Operations that must not produce routes.
    pub exclude: Vec<ExclusionConfig>,
}

/// A filter or predicate in configuration.
///
/// Either the shortcut form `"StripPrefix=1"` or a full table
/// `{ name = "StripPrefix", args = { parts = "1" } }`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DefinitionConfig {
    Shortcut(String),
    Full {
        name: String,
        #[serde(default)]
        args: BTreeMap<String, String>,
    },
}

/// Operation exclusion rule. All given fields must match.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Exact path template as written in the document (e.g., "/internal/health").
    pub path: Option<String>,

    /// Path template prefix (e.g., "/internal").
    pub path_prefix: Option<String>,

    /// HTTP methods; empty matches all.
    pub methods: Vec<String>,

    /// OpenAPI `operationId`.
    pub operation_id: Option<String>,
}

/// Refresh scheduling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Delay between the end of one refresh cycle and the start of the next.
    pub refresh_interval_secs: u64,

    /// Hard timeout for one source's pipeline, in milliseconds.
    pub source_timeout_ms: u64,

    /// Routes of a source that keeps failing are evicted after this long.
    pub max_staleness_secs: u64,

    /// Attempts per source per cycle for fetch failures (1 = no retry).
    pub max_attempts: u32,

    /// Base delay for exponential backoff between attempts.
    pub retry_base_delay_ms: u64,

    /// Maximum delay between attempts.
    pub retry_max_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
            source_timeout_ms: 10_000,
            max_staleness_secs: 900,
            max_attempts: 2,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 2000,
        }
    }
}

/// Document retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Documents larger than this are rejected.
    pub max_document_bytes: usize,

    /// User-Agent header sent with each request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: 4 * 1024 * 1024, // 4MB
            user_agent: "openapi-route-locator".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

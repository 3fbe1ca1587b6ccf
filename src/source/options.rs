//! Per-source conversion options.

use serde_json::{Map, Value};
use url::Url;

use crate::config::schema::{DefinitionConfig, ExclusionConfig, RouteSettingsConfig};
use crate::config::validation::ValidationError;
use crate::routing::definition::{Definition, FilterDefinition, HttpMethod, PredicateDefinition};
use crate::routing::merge::merge_layers;

/// Operations matching a rule produce no route. All set fields must match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExclusionRule {
    pub path: Option<String>,
    pub path_prefix: Option<String>,
    /// Empty matches every method.
    pub methods: Vec<HttpMethod>,
    pub operation_id: Option<String>,
}

impl ExclusionRule {
    fn from_config(config: &ExclusionConfig, field: &str) -> Result<Self, ValidationError> {
        let methods = config
            .methods
            .iter()
            .map(|m| m.parse::<HttpMethod>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ValidationError::InvalidRouteSetting {
                field: format!("{}.exclude", field),
                reason: e.to_string(),
            })?;
        Ok(Self {
            path: config.path.clone(),
            path_prefix: config.path_prefix.clone(),
            methods,
            operation_id: config.operation_id.clone(),
        })
    }

    /// `path` is the operation path as written in the document, before any base path.
    pub fn matches(&self, path: &str, method: HttpMethod, operation_id: Option<&str>) -> bool {
        self.path.as_deref().map_or(true, |p| p == path)
            && self
                .path_prefix
                .as_deref()
                .map_or(true, |prefix| path.starts_with(prefix))
            && (self.methods.is_empty() || self.methods.contains(&method))
            && self
                .operation_id
                .as_deref()
                .map_or(true, |id| operation_id == Some(id))
    }
}

/// Knobs that shape the routes produced for one source.
///
/// Built by layering the service's settings over the global defaults:
/// filters and predicates are concatenated (global first), metadata is
/// deep-merged, and scalars from the service win.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionOptions {
    /// Prefix for every route path; empty for none.
    pub base_path: String,
    /// Forward to this URI instead of the document's servers.
    pub target_uri: Option<Url>,
    pub filters: Vec<FilterDefinition>,
    pub predicates: Vec<PredicateDefinition>,
    pub metadata: Map<String, Value>,
    pub order: Option<i32>,
    pub exclusions: Vec<ExclusionRule>,
}

impl ConversionOptions {
    /// Layer `service` settings over `global` settings.
    pub fn layered(
        global: &RouteSettingsConfig,
        service: &RouteSettingsConfig,
        field: &str,
    ) -> Result<Self, ValidationError> {
        let invalid = |name: &str, reason: String| ValidationError::InvalidRouteSetting {
            field: format!("{}.{}", field, name),
            reason,
        };

        let definitions = |name: &str, entries: Vec<&DefinitionConfig>| {
            entries
                .into_iter()
                .map(Definition::from_config)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| invalid(name, e.to_string()))
        };
        let filters = definitions(
            "filters",
            global.filters.iter().chain(&service.filters).collect(),
        )?;
        let predicates = definitions(
            "predicates",
            global.predicates.iter().chain(&service.predicates).collect(),
        )?;

        let target_uri = service
            .target_uri
            .as_ref()
            .or(global.target_uri.as_ref())
            .map(|raw| Url::parse(raw).map_err(|e| invalid("target_uri", e.to_string())))
            .transpose()?;

        let exclusions = global
            .exclude
            .iter()
            .chain(&service.exclude)
            .map(|rule| ExclusionRule::from_config(rule, field))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base_path: service
                .base_path
                .clone()
                .or_else(|| global.base_path.clone())
                .unwrap_or_default(),
            target_uri,
            filters,
            predicates,
            metadata: merge_layers([Some(&global.metadata), Some(&service.metadata)])
                .unwrap_or_default(),
            order: service.order.or(global.order),
            exclusions,
        })
    }

    pub fn is_excluded(&self, path: &str, method: HttpMethod, operation_id: Option<&str>) -> bool {
        self.exclusions
            .iter()
            .any(|rule| rule.matches(path, method, operation_id))
    }
}

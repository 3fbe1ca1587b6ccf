//! Conversion of a parsed API description into route definitions.
//!
//! # Responsibilities
//! - One route per non-excluded `(path, method)` operation
//! - Assemble predicates, filters, metadata and order from the source's
//!   options and the `x-gateway-route-settings` extension
//! - Pick the forwarding target
//! - Run customizers and emit routes in a deterministic order
//!
//! # Design Decisions
//! - A bad operation is skipped with a diagnostic, never fails the build;
//!   only invalid document-level settings do, since they affect every route
//! - Document-level extension settings are deep-merged with operation-level
//!   ones, so lists concatenate (document first) and scalars from the
//!   operation win
//! - Target precedence: options override, operation/path servers, document
//!   servers, then the service base URI

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::openapi::model::{ApiDescription, OperationKey, OperationMetadata};
use crate::routing::customizer::{CustomizerContext, RouteCustomizer};
use crate::routing::definition::{
    Definition, FilterDefinition, PredicateDefinition, RouteDefinition,
};
use crate::routing::diagnostic::Diagnostic;
use crate::routing::matcher::{PathPattern, PathTemplateError};
use crate::routing::merge::merge_layers;
use crate::source::RouteSource;

/// Vendor extension carrying per-document and per-operation route settings.
pub const ROUTE_SETTINGS_EXTENSION: &str = "x-gateway-route-settings";

/// Operation extension that, when `true`, suppresses the route.
pub const EXCLUDE_EXTENSION: &str = "x-gateway-exclude";

/// Reasons a single operation cannot become a route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error(transparent)]
    InvalidPathTemplate(#[from] PathTemplateError),

    #[error("invalid '{field}' in x-gateway-route-settings: {reason}")]
    InvalidRouteSettings { field: &'static str, reason: String },
}

/// Routes of one source plus what was skipped along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOutput {
    pub routes: Vec<RouteDefinition>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Default)]
struct ExtensionSettings {
    filters: Vec<FilterDefinition>,
    predicates: Vec<PredicateDefinition>,
    metadata: Map<String, Value>,
    order: Option<i32>,
}

/// Converts API descriptions into routes. Stateless apart from its hooks.
#[derive(Clone, Default)]
pub struct RouteBuilder {
    customizers: Vec<Arc<dyn RouteCustomizer>>,
}

impl RouteBuilder {
    pub fn new(customizers: Vec<Arc<dyn RouteCustomizer>>) -> Self {
        Self { customizers }
    }

    /// Build the routes of `source` from its parsed document.
    pub fn build(&self, source: &RouteSource, api: &ApiDescription) -> Result<BuildOutput, BuildError> {
        extension_settings(&api.extensions, &Map::new())?;

        let mut output = BuildOutput::default();
        let mut seen_ids = HashSet::new();

        for (key, operation) in &api.operations {
            let skip = |reason: String| Diagnostic::SkippedOperation {
                source_id: source.id.clone(),
                path: key.path.clone(),
                method: key.method,
                reason,
            };

            match self.build_operation(source, api, key, operation) {
                Ok(Some(route)) => {
                    if seen_ids.insert(route.id.clone()) {
                        output.routes.push(route);
                    } else {
                        output
                            .diagnostics
                            .push(skip(format!("duplicate route id '{}'", route.id)));
                    }
                }
                Ok(None) => {
                    tracing::debug!(
                        source = %source.id,
                        method = %key.method,
                        path = %key.path,
                        "Operation excluded"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        source = %source.id,
                        method = %key.method,
                        path = %key.path,
                        error = %e,
                        "Skipping operation"
                    );
                    output.diagnostics.push(skip(e.to_string()));
                }
            }
        }

        output.routes.sort_by(|a, b| {
            a.path
                .specificity_cmp(&b.path)
                .then_with(|| a.method.cmp(&b.method))
        });
        Ok(output)
    }

    fn build_operation(
        &self,
        source: &RouteSource,
        api: &ApiDescription,
        key: &OperationKey,
        operation: &OperationMetadata,
    ) -> Result<Option<RouteDefinition>, BuildError> {
        let options = &source.options;
        let operation_id = operation.operation_id.as_deref();

        let excluded_by_extension =
            operation.extensions.get(EXCLUDE_EXTENSION) == Some(&Value::Bool(true));
        if excluded_by_extension || options.is_excluded(&key.path, key.method, operation_id) {
            return Ok(None);
        }

        let path = PathPattern::with_base_path(&options.base_path, &key.path)?;
        let settings = extension_settings(&api.extensions, &operation.extensions)?;

        let target_uri = options
            .target_uri
            .clone()
            .or_else(|| operation.servers.first().cloned())
            .or_else(|| api.servers.first().cloned())
            .unwrap_or_else(|| source.base_uri.clone());

        let mut route = RouteDefinition {
            id: RouteDefinition::route_id(&source.id, key.method, &path),
            source_id: source.id.clone(),
            method: key.method,
            predicates: options
                .predicates
                .iter()
                .cloned()
                .chain(settings.predicates)
                .collect(),
            target_uri: normalize_target(target_uri),
            filters: options
                .filters
                .iter()
                .cloned()
                .chain(settings.filters)
                .collect(),
            metadata: merge_layers([Some(&options.metadata), Some(&settings.metadata)])
                .unwrap_or_default(),
            order: settings.order.or(options.order).unwrap_or(0),
            path,
        };

        let context = CustomizerContext {
            source,
            operation_id,
            document_extensions: &api.extensions,
            operation_extensions: &operation.extensions,
        };
        for customizer in &self.customizers {
            customizer.customize(&mut route, &context);
        }

        Ok(Some(route))
    }
}

/// Drop the fragment and an empty query from a server URL.
fn normalize_target(mut url: Url) -> Url {
    if url.query() == Some("") {
        url.set_query(None);
    }
    url.set_fragment(None);
    url
}

fn extension_settings(
    document: &Map<String, Value>,
    operation: &Map<String, Value>,
) -> Result<ExtensionSettings, BuildError> {
    let layer = |extensions: &Map<String, Value>| match extensions.get(ROUTE_SETTINGS_EXTENSION) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(settings)) => Ok(Some(settings.clone())),
        Some(_) => Err(BuildError::InvalidRouteSettings {
            field: "settings",
            reason: "must be an object".into(),
        }),
    };
    let document = layer(document)?;
    let operation = layer(operation)?;

    let Some(merged) = merge_layers([document.as_ref(), operation.as_ref()]) else {
        return Ok(ExtensionSettings::default());
    };

    let metadata = match merged.get("metadata") {
        None => Map::new(),
        Some(Value::Object(metadata)) => metadata.clone(),
        Some(_) => {
            return Err(BuildError::InvalidRouteSettings {
                field: "metadata",
                reason: "must be an object".into(),
            })
        }
    };

    let order = merged
        .get("order")
        .map(|value| {
            value
                .as_i64()
                .and_then(|order| i32::try_from(order).ok())
                .ok_or_else(|| BuildError::InvalidRouteSettings {
                    field: "order",
                    reason: format!("{} is not a 32-bit integer", value),
                })
        })
        .transpose()?;

    Ok(ExtensionSettings {
        filters: definitions(merged.get("filters"), "filters")?,
        predicates: definitions(merged.get("predicates"), "predicates")?,
        metadata,
        order,
    })
}

fn definitions(value: Option<&Value>, field: &'static str) -> Result<Vec<Definition>, BuildError> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(Definition::from_json)
            .collect::<Result<_, _>>()
            .map_err(|e| BuildError::InvalidRouteSettings {
                field,
                reason: e.to_string(),
            }),
        Some(_) => Err(BuildError::InvalidRouteSettings {
            field,
            reason: "must be a list".into(),
        }),
    }
}

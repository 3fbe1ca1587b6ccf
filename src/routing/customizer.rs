//! Route customization hooks.
//!
//! Customizers run once per route after the builder has assembled the
//! filter chain, predicates, metadata and order. They may rewrite any field.

use serde_json::{Map, Value};

use crate::routing::definition::RouteDefinition;
use crate::source::RouteSource;

/// What a customizer can see about the operation a route came from.
#[derive(Debug, Clone, Copy)]
pub struct CustomizerContext<'a> {
    pub source: &'a RouteSource,
    pub operation_id: Option<&'a str>,
    /// `x-` members of the document root.
    pub document_extensions: &'a Map<String, Value>,
    /// `x-` members of the operation object.
    pub operation_extensions: &'a Map<String, Value>,
}

/// Hook applied to every generated route.
pub trait RouteCustomizer: Send + Sync {
    fn customize(&self, route: &mut RouteDefinition, context: &CustomizerContext<'_>);
}

impl<F> RouteCustomizer for F
where
    F: Fn(&mut RouteDefinition, &CustomizerContext<'_>) + Send + Sync,
{
    fn customize(&self, route: &mut RouteDefinition, context: &CustomizerContext<'_>) {
        self(route, context)
    }
}

/// Copies the operation id into route metadata under `operationId`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationIdMetadata;

impl RouteCustomizer for OperationIdMetadata {
    fn customize(&self, route: &mut RouteDefinition, context: &CustomizerContext<'_>) {
        if let Some(id) = context.operation_id {
            route
                .metadata
                .entry("operationId")
                .or_insert_with(|| Value::String(id.to_string()));
        }
    }
}

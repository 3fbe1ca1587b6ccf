//! Structural model of a parsed OpenAPI document.
//!
//! Only what route conversion needs is kept: operations keyed by path and
//! method, declared servers, operation ids and vendor extensions.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use url::Url;

use crate::routing::definition::HttpMethod;

/// Identifies one operation within a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationKey {
    /// Path template as written in the document.
    pub path: String,
    pub method: HttpMethod,
}

impl OperationKey {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationMetadata {
    pub operation_id: Option<String>,
    /// Operation-level servers, or the path item's when the operation has none.
    pub servers: Vec<Url>,
    /// `x-` prefixed members of the operation object.
    pub extensions: Map<String, Value>,
}

/// One parsed OpenAPI document. Transient: built per fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiDescription {
    pub openapi_version: String,
    pub title: String,
    /// Document-level servers, resolved to absolute URLs.
    pub servers: Vec<Url>,
    /// Ordered by path then method.
    pub operations: BTreeMap<OperationKey, OperationMetadata>,
    /// `x-` prefixed members of the root object.
    pub extensions: Map<String, Value>,
}

impl ApiDescription {
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}

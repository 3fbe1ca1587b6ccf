//! Non-fatal findings produced while building and merging routes.

use std::fmt;

use serde::Serialize;

use crate::routing::definition::HttpMethod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Diagnostic {
    /// An operation produced no route.
    SkippedOperation {
        source_id: String,
        path: String,
        method: HttpMethod,
        reason: String,
    },

    /// A route lost a `(path, method)` collision to a higher-priority source.
    ShadowedRoute {
        route_id: String,
        source_id: String,
        shadowed_by: String,
    },
}

impl Diagnostic {
    /// Id of the losing route, for `ShadowedRoute`.
    pub fn shadowed_route_id(&self) -> Option<&str> {
        match self {
            Diagnostic::ShadowedRoute { route_id, .. } => Some(route_id),
            Diagnostic::SkippedOperation { .. } => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SkippedOperation {
                source_id,
                path,
                method,
                reason,
            } => write!(f, "[{}] skipped {} {}: {}", source_id, method, path, reason),
            Diagnostic::ShadowedRoute {
                route_id,
                shadowed_by,
                ..
            } => write!(f, "route {} shadowed by source {}", route_id, shadowed_by),
        }
    }
}

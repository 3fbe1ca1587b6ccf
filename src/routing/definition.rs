//! Route definition value types.
//!
//! A `RouteDefinition` is one normalized routing rule derived from one
//! OpenAPI operation. It is a plain value: two definitions are equal when
//! their content is equal, which is what change detection between refreshes
//! relies on.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::schema::DefinitionConfig;
use crate::routing::matcher::PathPattern;

/// Prefix for positional arguments of shortcut definitions.
const GENERATED_KEY_PREFIX: &str = "_genkey_";

/// HTTP methods an OpenAPI path item can declare.
///
/// Declaration order is the OpenAPI path item order and is used as the final
/// sort key for routes sharing a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown HTTP method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    /// Case-insensitive, so both OpenAPI keys (`get`) and config values (`GET`) parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Errors in filter/predicate definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("definition '{0}' has an empty name")]
    EmptyName(String),

    #[error("definition name '{0}' contains whitespace")]
    InvalidName(String),
}

/// A named filter or predicate with string arguments.
///
/// Mirrors the gateway notation: the shortcut `AddRequestHeader=X-Foo, bar`
/// yields positional arguments `_genkey_0 = X-Foo`, `_genkey_1 = bar`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

/// A filter applied to requests/responses on a route.
pub type FilterDefinition = Definition;

/// An additional predicate a request must satisfy to match a route.
pub type PredicateDefinition = Definition;

impl Definition {
    pub fn new(name: impl Into<String>, args: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Parse the shortcut form `Name=arg0, arg1`. A bare `Name` has no args.
    pub fn parse_shortcut(text: &str) -> Result<Self, DefinitionError> {
        let (name, raw_args) = match text.split_once('=') {
            Some((name, args)) => (name.trim(), Some(args)),
            None => (text.trim(), None),
        };
        Self::check_name(name, text)?;

        let args = raw_args
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .enumerate()
                    .map(|(i, v)| (format!("{GENERATED_KEY_PREFIX}{i}"), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self::new(name, args))
    }

    /// Build from a configuration entry.
    pub fn from_config(config: &DefinitionConfig) -> Result<Self, DefinitionError> {
        match config {
            DefinitionConfig::Shortcut(text) => Self::parse_shortcut(text),
            DefinitionConfig::Full { name, args } => {
                Self::check_name(name, name)?;
                Ok(Self::new(name.clone(), args.clone()))
            }
        }
    }

    /// Build from an OpenAPI extension value: a shortcut string or an object
    /// `{name, args}`. Non-string arguments are rendered as JSON text.
    pub fn from_json(value: &Value) -> Result<Self, DefinitionError> {
        match value {
            Value::String(text) => Self::parse_shortcut(text),
            Value::Object(map) => {
                let name = map.get("name").and_then(Value::as_str).unwrap_or_default();
                Self::check_name(name, &value.to_string())?;
                let args = map
                    .get("args")
                    .and_then(Value::as_object)
                    .map(|args| {
                        args.iter()
                            .map(|(k, v)| {
                                let v = match v {
                                    Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                };
                                (k.clone(), v)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Self::new(name, args))
            }
            other => Err(DefinitionError::EmptyName(other.to_string())),
        }
    }

    fn check_name(name: &str, text: &str) -> Result<(), DefinitionError> {
        if name.is_empty() {
            return Err(DefinitionError::EmptyName(text.to_string()));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(DefinitionError::InvalidName(name.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.args.is_empty() {
            return Ok(());
        }
        f.write_str("=")?;
        for (i, (key, value)) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if key.starts_with(GENERATED_KEY_PREFIX) {
                f.write_str(value)?;
            } else {
                write!(f, "{key}: {value}")?;
            }
        }
        Ok(())
    }
}

/// One routing rule derived from one API operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDefinition {
    /// `{source}:{METHOD}:{path}`; stable while the operation is unchanged.
    pub id: String,

    /// Source that produced this route.
    pub source_id: String,

    /// Path predicate, including the source's base path.
    pub path: PathPattern,

    /// Method predicate.
    pub method: HttpMethod,

    /// Additional predicates beyond path and method.
    pub predicates: Vec<PredicateDefinition>,

    /// Where matching requests are forwarded.
    pub target_uri: Url,

    /// Ordered filter chain.
    pub filters: Vec<FilterDefinition>,

    pub metadata: serde_json::Map<String, Value>,

    /// Relative priority; lower values are matched first.
    pub order: i32,
}

impl RouteDefinition {
    /// Derive the route id for an operation of a source.
    pub fn route_id(source_id: &str, method: HttpMethod, path: &PathPattern) -> String {
        format!("{}:{}:{}", source_id, method, path.template())
    }

    /// Key under which routes of different sources collide.
    pub fn collision_key(&self) -> (HttpMethod, String) {
        (self.method, self.path.normalized())
    }

    /// Returns true if the path and method predicates accept the request.
    ///
    /// Additional predicates are evaluated by the dispatch layer.
    pub fn matches(&self, method: HttpMethod, path: &str) -> bool {
        self.method == method && self.path.matches(path)
    }

    /// Gateway notation of the path predicate, e.g. `Path=/api/orders/{id}`.
    pub fn path_predicate(&self) -> String {
        format!("Path={}", self.path.template())
    }

    /// Gateway notation of the method predicate, e.g. `Method=GET`.
    pub fn method_predicate(&self) -> String {
        format!("Method={}", self.method)
    }
}

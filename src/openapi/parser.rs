//! OpenAPI document parsing and structural validation.
//!
//! # Responsibilities
//! - Decode JSON or YAML documents into a JSON value tree
//! - Check the OpenAPI version (3.0.x and 3.1.x)
//! - Validate the shape of `info`, `servers`, `paths` and operations
//! - Resolve server URLs (variables, relative URLs) against the document URL
//!
//! # Design Decisions
//! - Parsing is atomic: any violation fails the whole document
//! - Path templates are not validated here; the builder skips bad ones
//! - YAML keys that are not strings (e.g., `200:`) are rendered as strings

use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::openapi::model::{ApiDescription, OperationKey, OperationMetadata};
use crate::routing::definition::HttpMethod;

/// Reasons a document cannot be turned into an `ApiDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed document: {0}")]
    MalformedSyntax(String),

    #[error("unsupported OpenAPI version '{0}'")]
    UnsupportedVersion(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),
}

fn violation(detail: impl Into<String>) -> ParseError {
    ParseError::SchemaViolation(detail.into())
}

/// Parse a JSON or YAML OpenAPI document.
///
/// `document_url` is the base for relative server URLs.
pub fn parse_document(bytes: &[u8], document_url: &Url) -> Result<ApiDescription, ParseError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ParseError::MalformedSyntax(format!("invalid UTF-8: {}", e)))?;
    let text = text.trim_start_matches('\u{feff}');

    let root = decode(text)?;
    let root = match root {
        Value::Object(map) => map,
        _ => return Err(violation("document root must be an object")),
    };

    let version = check_version(&root)?;

    let info = root
        .get("info")
        .and_then(Value::as_object)
        .ok_or_else(|| violation("'info' must be an object"))?;
    let title = info
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let servers = parse_servers(root.get("servers"), "servers", document_url)?;

    let mut operations = std::collections::BTreeMap::new();
    match root.get("paths") {
        Some(Value::Object(paths)) => {
            for (path, item) in paths {
                parse_path_item(path, item, document_url, &mut operations)?;
            }
        }
        None if version.starts_with("3.1") => {}
        None => return Err(violation("'paths' is required")),
        Some(_) => return Err(violation("'paths' must be an object")),
    }

    Ok(ApiDescription {
        openapi_version: version,
        title,
        servers,
        operations,
        extensions: extensions_of(&root),
    })
}

fn decode(text: &str) -> Result<Value, ParseError> {
    if text.trim_start().starts_with('{') {
        return serde_json::from_str(text).map_err(|e| ParseError::MalformedSyntax(e.to_string()));
    }
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ParseError::MalformedSyntax(e.to_string()))?;
    yaml_to_json(yaml)
}

fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, ParseError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => {
                        return Err(ParseError::MalformedSyntax(format!(
                            "unsupported mapping key {:?}",
                            other
                        )))
                    }
                };
                map.insert(key, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn check_version(root: &Map<String, Value>) -> Result<String, ParseError> {
    if let Some(swagger) = root.get("swagger") {
        return Err(ParseError::UnsupportedVersion(scalar_text(swagger)));
    }

    let version = root
        .get("openapi")
        .map(scalar_text)
        .ok_or_else(|| violation("missing 'openapi' version field"))?;

    let mut parts = version.split('.');
    match (parts.next(), parts.next()) {
        (Some("3"), Some("0" | "1")) => Ok(version),
        _ => Err(ParseError::UnsupportedVersion(version)),
    }
}

/// YAML `openapi: 3.0` decodes as a number; render scalars as text.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_path_item(
    path: &str,
    item: &Value,
    document_url: &Url,
    operations: &mut std::collections::BTreeMap<OperationKey, OperationMetadata>,
) -> Result<(), ParseError> {
    let item = item
        .as_object()
        .ok_or_else(|| violation(format!("path item '{}' must be an object", path)))?;

    let path_servers = parse_servers(item.get("servers"), &format!("{}.servers", path), document_url)?;

    for method in HttpMethod::ALL {
        let key = method.as_str().to_ascii_lowercase();
        let Some(operation) = item.get(&key) else {
            continue;
        };
        let context = format!("{} {}", method, path);
        let operation = operation
            .as_object()
            .ok_or_else(|| violation(format!("operation '{}' must be an object", context)))?;

        let operation_id = match operation.get("operationId") {
            None => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => return Err(violation(format!("'{}' operationId must be a string", context))),
        };

        let mut servers = parse_servers(
            operation.get("servers"),
            &format!("{}.servers", context),
            document_url,
        )?;
        if servers.is_empty() {
            servers = path_servers.clone();
        }

        operations.insert(
            OperationKey::new(path, method),
            OperationMetadata {
                operation_id,
                servers,
                extensions: extensions_of(operation),
            },
        );
    }
    Ok(())
}

fn parse_servers(value: Option<&Value>, context: &str, document_url: &Url) -> Result<Vec<Url>, ParseError> {
    let servers = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(servers)) => servers,
        Some(_) => return Err(violation(format!("'{}' must be an array", context))),
    };

    servers
        .iter()
        .enumerate()
        .map(|(i, server)| {
            let server = server
                .as_object()
                .ok_or_else(|| violation(format!("'{}[{}]' must be an object", context, i)))?;
            let raw = server
                .get("url")
                .and_then(Value::as_str)
                .ok_or_else(|| violation(format!("'{}[{}].url' must be a string", context, i)))?;
            let expanded = expand_variables(raw, server.get("variables"))?;
            document_url
                .join(&expanded)
                .map_err(|e| violation(format!("server URL '{}': {}", raw, e)))
        })
        .collect()
}

/// Substitute `{name}` with the default of the server variable `name`.
fn expand_variables(raw: &str, variables: Option<&Value>) -> Result<String, ParseError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| violation(format!("server URL '{}' has unbalanced braces", raw)))?;
        let name = &after[..close];
        let default = variables
            .and_then(|v| v.get(name))
            .and_then(|v| v.get("default"))
            .map(scalar_text)
            .ok_or_else(|| violation(format!("server variable '{}' has no default", name)))?;
        out.push_str(&default);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn extensions_of(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .iter()
        .filter(|(k, _)| k.starts_with("x-"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_url() -> Url {
        Url::parse("http://orders:8080/internal/openapi-definition").unwrap()
    }

    const YAML_DOC: &str = r#"
openapi: 3.0.3
info:
  title: Orders
  version: "1.0"
servers:
  - url: /v1
x-gateway-route-settings:
  filters:
    - AddResponseHeader=X-Api, orders
paths:
  /orders:
    get:
      operationId: listOrders
      responses:
        200:
          description: OK
    post:
      x-gateway-route-settings:
        order: 3
  /orders/{id}:
    servers:
      - url: "https://{region}.orders.example.com"
        variables:
          region:
            default: eu
    get:
      operationId: getOrder
    delete:
      servers:
        - url: http://orders-admin:9000
    parameters: []
"#;

    #[test]
    fn test_parse_yaml() {
        let api = parse_document(YAML_DOC.as_bytes(), &doc_url()).unwrap();
        assert_eq!(api.openapi_version, "3.0.3");
        assert_eq!(api.title, "Orders");
        assert_eq!(api.servers, vec![Url::parse("http://orders:8080/v1").unwrap()]);
        assert_eq!(api.operation_count(), 4);
        assert!(api.extensions.contains_key("x-gateway-route-settings"));

        let list = &api.operations[&OperationKey::new("/orders", HttpMethod::Get)];
        assert_eq!(list.operation_id.as_deref(), Some("listOrders"));
        assert!(list.servers.is_empty());

        let create = &api.operations[&OperationKey::new("/orders", HttpMethod::Post)];
        assert_eq!(create.extensions["x-gateway-route-settings"]["order"], 3);

        let get = &api.operations[&OperationKey::new("/orders/{id}", HttpMethod::Get)];
        assert_eq!(get.servers[0].as_str(), "https://eu.orders.example.com/");

        let delete = &api.operations[&OperationKey::new("/orders/{id}", HttpMethod::Delete)];
        assert_eq!(delete.servers[0].as_str(), "http://orders-admin:9000/");
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "openapi": "3.1.0",
            "info": { "title": "Users", "version": "2" },
            "paths": { "/users/{id}": { "get": {}, "patch": {} } }
        }"#;
        let api = parse_document(json.as_bytes(), &doc_url()).unwrap();
        assert_eq!(api.openapi_version, "3.1.0");
        assert!(api.servers.is_empty());
        let keys: Vec<_> = api.operations.keys().map(|k| k.method).collect();
        assert_eq!(keys, vec![HttpMethod::Get, HttpMethod::Patch]);
    }

    #[test]
    fn test_paths_optional_in_31() {
        let doc = "openapi: 3.1.0\ninfo: { title: Hooks, version: '1' }\n";
        assert!(parse_document(doc.as_bytes(), &doc_url()).unwrap().operations.is_empty());

        let doc = "openapi: 3.0.0\ninfo: { title: Hooks, version: '1' }\n";
        assert_eq!(
            parse_document(doc.as_bytes(), &doc_url()),
            Err(ParseError::SchemaViolation("'paths' is required".into()))
        );
    }

    #[test]
    fn test_versions() {
        let swagger = r#"{"swagger": "2.0", "info": {}, "paths": {}}"#;
        assert_eq!(
            parse_document(swagger.as_bytes(), &doc_url()),
            Err(ParseError::UnsupportedVersion("2.0".into()))
        );

        let future = "openapi: 4.0.0\ninfo: {}\npaths: {}\n";
        assert_eq!(
            parse_document(future.as_bytes(), &doc_url()),
            Err(ParseError::UnsupportedVersion("4.0.0".into()))
        );

        let numeric = "openapi: 3.0\ninfo: {}\npaths: {}\n";
        assert!(parse_document(numeric.as_bytes(), &doc_url()).is_ok());

        let missing = "info: {}\npaths: {}\n";
        assert!(matches!(
            parse_document(missing.as_bytes(), &doc_url()),
            Err(ParseError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_malformed_and_violations() {
        assert!(matches!(
            parse_document(b"{ \"openapi\": ", &doc_url()),
            Err(ParseError::MalformedSyntax(_))
        ));
        assert!(matches!(
            parse_document(b"openapi: [unclosed", &doc_url()),
            Err(ParseError::MalformedSyntax(_))
        ));
        assert!(matches!(
            parse_document(&[0xff, 0xfe, 0x00], &doc_url()),
            Err(ParseError::MalformedSyntax(_))
        ));
        assert!(matches!(
            parse_document(b"- just\n- a list\n", &doc_url()),
            Err(ParseError::SchemaViolation(_))
        ));

        let bad_operation = "openapi: 3.0.1\ninfo: {}\npaths:\n  /a:\n    get: nope\n";
        assert!(matches!(
            parse_document(bad_operation.as_bytes(), &doc_url()),
            Err(ParseError::SchemaViolation(_))
        ));

        let missing_variable =
            "openapi: 3.0.1\ninfo: {}\nservers:\n  - url: 'http://{host}:8080'\npaths: {}\n";
        assert!(matches!(
            parse_document(missing_variable.as_bytes(), &doc_url()),
            Err(ParseError::SchemaViolation(_))
        ));
    }
}

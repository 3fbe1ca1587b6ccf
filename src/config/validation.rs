//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Service ids are present and unique
//! - Base URIs and document URIs are well-formed
//! - Value ranges (timeouts > 0, intervals > 0)
//! - Filter/predicate shortcuts and exclusion methods parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LocatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeMap;

use thiserror::Error;
use url::Url;

use crate::config::schema::{LocatorConfig, RouteSettingsConfig};
use crate::routing::definition::{Definition, HttpMethod};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service #{0} has a blank id")]
    BlankServiceId(usize),

    #[error("contains duplicate service ids: {0}")]
    DuplicateServiceIds(String),

    #[error("{field}: '{uri}' {reason}")]
    InvalidUri {
        field: String,
        uri: String,
        reason: &'static str,
    },

    #[error("{field} must be greater than zero")]
    NotPositive { field: String },

    #[error("{field}: {reason}")]
    InvalidRouteSetting { field: String, reason: String },
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &LocatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let scheduler = &config.scheduler;
    check_positive(&mut errors, "scheduler.refresh_interval_secs", scheduler.refresh_interval_secs);
    check_positive(&mut errors, "scheduler.source_timeout_ms", scheduler.source_timeout_ms);
    check_positive(&mut errors, "scheduler.max_staleness_secs", scheduler.max_staleness_secs);
    check_positive(&mut errors, "scheduler.max_attempts", u64::from(scheduler.max_attempts));
    check_positive(&mut errors, "fetch.max_document_bytes", config.fetch.max_document_bytes as u64);

    check_definition_uri(&mut errors, "openapi_definition_uri", &config.openapi_definition_uri);
    check_route_settings(&mut errors, "default_route_settings", &config.default_route_settings);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, service) in config.services.iter().enumerate() {
        let prefix = format!("services[{}]", i);
        if service.id.trim().is_empty() {
            errors.push(ValidationError::BlankServiceId(i));
        } else {
            *counts.entry(service.id.as_str()).or_default() += 1;
        }

        check_base_uri(&mut errors, &format!("{}.uri", prefix), &service.uri);
        if let Some(uri) = &service.openapi_definition_uri {
            check_definition_uri(&mut errors, &format!("{}.openapi_definition_uri", prefix), uri);
        }
        if let Some(timeout) = service.timeout_ms {
            check_positive(&mut errors, &format!("{}.timeout_ms", prefix), timeout);
        }
        check_route_settings(&mut errors, &format!("{}.route_settings", prefix), &service.route_settings);
    }

    let duplicates: Vec<&str> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    if !duplicates.is_empty() {
        errors.push(ValidationError::DuplicateServiceIds(duplicates.join(",")));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::NotPositive {
            field: field.to_string(),
        });
    }
}

fn invalid_uri(field: &str, uri: &str, reason: &'static str) -> ValidationError {
    ValidationError::InvalidUri {
        field: field.to_string(),
        uri: uri.to_string(),
        reason,
    }
}

/// A service base URI must be absolute with an empty or `/` path, and carry
/// no query or fragment.
fn check_base_uri(errors: &mut Vec<ValidationError>, field: &str, uri: &str) {
    let parsed = match Url::parse(uri) {
        Ok(parsed) => parsed,
        Err(_) => {
            errors.push(invalid_uri(field, uri, "must be an absolute URI"));
            return;
        }
    };
    if parsed.cannot_be_a_base() {
        errors.push(invalid_uri(field, uri, "must be an absolute URI"));
    } else if !parsed.path().is_empty() && parsed.path() != "/" {
        errors.push(invalid_uri(field, uri, "path must be empty or '/'"));
    } else if parsed.query().is_some() {
        errors.push(invalid_uri(field, uri, "must have no query parameters"));
    } else if parsed.fragment().is_some() {
        errors.push(invalid_uri(field, uri, "must have no fragment part"));
    }
}

/// A document URI is either absolute or an absolute path.
fn check_definition_uri(errors: &mut Vec<ValidationError>, field: &str, uri: &str) {
    if uri.starts_with('/') || Url::parse(uri).is_ok() {
        return;
    }
    errors.push(invalid_uri(field, uri, "must be absolute or start with '/'"));
}

fn check_route_settings(errors: &mut Vec<ValidationError>, field: &str, settings: &RouteSettingsConfig) {
    let invalid = |name: &str, reason: String| ValidationError::InvalidRouteSetting {
        field: format!("{}.{}", field, name),
        reason,
    };

    if let Some(base_path) = &settings.base_path {
        if !base_path.is_empty() && !base_path.starts_with('/') {
            errors.push(invalid("base_path", format!("'{}' must start with '/'", base_path)));
        }
        if base_path.contains(['{', '}', '?', '#']) {
            errors.push(invalid("base_path", format!("'{}' must be a plain path", base_path)));
        }
    }

    if let Some(target) = &settings.target_uri {
        if Url::parse(target).map(|u| u.cannot_be_a_base()).unwrap_or(true) {
            errors.push(invalid_uri(&format!("{}.target_uri", field), target, "must be an absolute URI"));
        }
    }

    for (i, filter) in settings.filters.iter().enumerate() {
        if let Err(e) = Definition::from_config(filter) {
            errors.push(invalid(&format!("filters[{}]", i), e.to_string()));
        }
    }
    for (i, predicate) in settings.predicates.iter().enumerate() {
        if let Err(e) = Definition::from_config(predicate) {
            errors.push(invalid(&format!("predicates[{}]", i), e.to_string()));
        }
    }

    for (i, rule) in settings.exclude.iter().enumerate() {
        for method in &rule.methods {
            if let Err(e) = method.parse::<HttpMethod>() {
                errors.push(invalid(&format!("exclude[{}].methods", i), e.to_string()));
            }
        }
    }
}

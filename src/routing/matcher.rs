//! Path template matching.
//!
//! # Responsibilities
//! - Parse OpenAPI path templates (`/orders/{id}`) into segment patterns
//! - Match request paths against compiled patterns
//! - Rank patterns by specificity for deterministic precedence
//!
//! # Design Decisions
//! - A parameter matches exactly one non-empty path segment
//! - Literal text around a parameter inside one segment is allowed (`{name}.json`)
//! - Matching is case-sensitive and segment-count exact
//! - No regex to guarantee O(n) matching

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Reasons a path template cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathTemplateError {
    #[error("path template is empty")]
    Empty,

    #[error("path template '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("path template '{0}' has unbalanced braces")]
    UnbalancedBraces(String),

    #[error("path template '{0}' has an empty parameter name")]
    EmptyParameter(String),

    #[error("path template '{template}' declares parameter '{name}' twice")]
    DuplicateParameter { template: String, name: String },

    #[error("path template '{0}' has adjacent parameters in one segment")]
    AdjacentParameters(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Template(Vec<Part>),
}

impl Segment {
    /// 0 for static segments, 1 for segments containing a parameter.
    fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 0,
            Segment::Template(_) => 1,
        }
    }

    fn matches(&self, actual: &str) -> bool {
        match self {
            Segment::Literal(expected) => expected == actual,
            Segment::Template(parts) => match_parts(parts, actual),
        }
    }
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a path template.
    pub fn parse(template: &str) -> Result<Self, PathTemplateError> {
        if template.is_empty() {
            return Err(PathTemplateError::Empty);
        }
        if !template.starts_with('/') {
            return Err(PathTemplateError::MissingLeadingSlash(template.to_string()));
        }

        let mut seen = HashSet::new();
        let mut segments = Vec::new();
        for raw in split_segments(template) {
            let segment = parse_segment(template, raw)?;
            if let Segment::Template(parts) = &segment {
                for part in parts {
                    if let Part::Param(name) = part {
                        if !seen.insert(name.clone()) {
                            return Err(PathTemplateError::DuplicateParameter {
                                template: template.to_string(),
                                name: name.clone(),
                            });
                        }
                    }
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    /// Compile a template under a base path prefix.
    pub fn with_base_path(base_path: &str, template: &str) -> Result<Self, PathTemplateError> {
        Self::parse(&join_base_path(base_path, template))
    }

    /// The template as written, including any base path.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Template with parameter names erased, so `/a/{id}` and `/a/{key}`
    /// normalize to the same string.
    pub fn normalized(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Template(parts) => {
                    for part in parts {
                        match part {
                            Part::Literal(s) => out.push_str(s),
                            Part::Param(_) => out.push_str("{}"),
                        }
                    }
                }
            }
        }
        out
    }

    /// Returns true if the request path matches this pattern.
    ///
    /// `path` must not contain a query string.
    pub fn matches(&self, path: &str) -> bool {
        if !path.starts_with('/') {
            return false;
        }
        let actual = split_segments(path);
        actual.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(actual)
                .all(|(segment, value)| segment.matches(value))
    }

    /// Precedence order: static segments before parameterized ones at the
    /// first differing position, then shorter paths, then the template text.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        let ranks = |p: &Self| p.segments.iter().map(Segment::rank).collect::<Vec<_>>();
        ranks(self)
            .cmp(&ranks(other))
            .then_with(|| self.template.cmp(&other.template))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl Serialize for PathPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.template)
    }
}

/// Join a base path and an operation path: `("/api/", "/orders")` → `/api/orders`.
pub fn join_base_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return path.to_string();
    }
    let base = if base.starts_with('/') {
        base.to_string()
    } else {
        format!("/{}", base)
    };
    if path == "/" || path.is_empty() {
        return base;
    }
    format!("{}{}", base, path)
}

fn split_segments(path: &str) -> Vec<&str> {
    if path == "/" {
        return Vec::new();
    }
    path[1..].split('/').collect()
}

fn parse_segment(template: &str, raw: &str) -> Result<Segment, PathTemplateError> {
    if !raw.contains('{') && !raw.contains('}') {
        return Ok(Segment::Literal(raw.to_string()));
    }

    let unbalanced = || PathTemplateError::UnbalancedBraces(template.to_string());
    let mut parts = Vec::new();
    let mut rest = raw;
    while !rest.is_empty() {
        match rest.find(['{', '}']) {
            None => {
                parts.push(Part::Literal(rest.to_string()));
                break;
            }
            Some(idx) if rest.as_bytes()[idx] == b'}' => return Err(unbalanced()),
            Some(open) => {
                if open > 0 {
                    parts.push(Part::Literal(rest[..open].to_string()));
                }
                let after = &rest[open + 1..];
                let close = after.find('}').ok_or_else(unbalanced)?;
                let name = &after[..close];
                if name.contains('{') {
                    return Err(unbalanced());
                }
                if name.trim().is_empty() {
                    return Err(PathTemplateError::EmptyParameter(template.to_string()));
                }
                if matches!(parts.last(), Some(Part::Param(_))) {
                    return Err(PathTemplateError::AdjacentParameters(template.to_string()));
                }
                parts.push(Part::Param(name.to_string()));
                rest = &after[close + 1..];
            }
        }
    }
    Ok(Segment::Template(parts))
}

/// Match a segment's parts. Parameters take at least one character and are
/// resolved lazily against the next literal, backtracking on failure.
fn match_parts(parts: &[Part], actual: &str) -> bool {
    match parts.split_first() {
        None => actual.is_empty(),
        Some((Part::Literal(lit), rest)) => actual
            .strip_prefix(lit.as_str())
            .is_some_and(|remaining| match_parts(rest, remaining)),
        Some((Part::Param(_), rest)) => match rest.split_first() {
            None => !actual.is_empty(),
            Some((Part::Literal(lit), after)) => actual
                .match_indices(lit.as_str())
                .filter(|(idx, _)| *idx > 0)
                .any(|(idx, _)| match_parts(after, &actual[idx + lit.len()..])),
            // Rejected by the parser.
            Some((Part::Param(_), _)) => false,
        },
    }
}

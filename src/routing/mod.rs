//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! ApiDescription + RouteSource
//!     → builder.rs (one route per operation, settings layered)
//!     → customizer.rs (per-route hooks)
//!     → Vec<RouteDefinition> sorted by specificity
//!
//! Request dispatch (per request):
//!     (method, path)
//!     → matcher.rs (segment-wise template match)
//!     → first matching route in snapshot order
//! ```
//!
//! # Design Decisions
//! - Route definitions are plain values compared by content
//! - No regex in the match path
//! - Deterministic: the same document always yields the same route list
//! - Static segments take precedence over parameters at the first difference

pub mod builder;
pub mod customizer;
pub mod definition;
pub mod diagnostic;
pub mod matcher;
pub mod merge;

pub use builder::{BuildError, BuildOutput, RouteBuilder};
pub use customizer::{CustomizerContext, OperationIdMetadata, RouteCustomizer};
pub use definition::{
    Definition, FilterDefinition, HttpMethod, PredicateDefinition, RouteDefinition,
};
pub use diagnostic::Diagnostic;
pub use matcher::{PathPattern, PathTemplateError};

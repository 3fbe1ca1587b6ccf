//! Route source registration.
//!
//! # Data Flow
//! ```text
//! LocatorConfig (validated)
//!     → options.rs (layer global + service route settings)
//!     → registry.rs (resolve document URLs, assign ranks)
//!     → SourceRegistry (immutable, shared via Arc)
//! ```

pub mod options;
pub mod registry;

pub use options::{ConversionOptions, ExclusionRule};
pub use registry::{RouteSource, SourceRegistry};

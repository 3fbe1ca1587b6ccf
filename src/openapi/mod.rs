//! OpenAPI document model and parser.
//!
//! # Data Flow
//! ```text
//! FetchedDocument.bytes
//!     → parser.rs (JSON/YAML decode, version check, structural validation)
//!     → ApiDescription { servers, operations, extensions }
//!     → routing::builder
//! ```

pub mod model;
pub mod parser;

pub use model::{ApiDescription, OperationKey, OperationMetadata};
pub use parser::{parse_document, ParseError};

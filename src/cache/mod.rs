//! Route cache subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline outcome for source S
//!     → store.rs (replace S's SourceRouteSet: Fresh / StaleOnError / Evicted)
//!     → snapshot.rs (merge all sets, resolve collisions by rank)
//!     → ArcSwap publish
//!     → readers: current_snapshot() (one atomic load)
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable and fully built before publication
//! - A snapshot never mixes two generations of one source
//! - Failures keep last-good routes until the staleness limit

pub mod snapshot;
pub mod store;

pub use snapshot::{RoutingSnapshot, SourceRouteSet, SourceStatus};
pub use store::{CacheError, RouteCache, SourceUpdate};

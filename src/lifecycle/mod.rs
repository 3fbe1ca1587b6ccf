//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Registry → Fetcher → Pipeline → Cache → Refresher
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → refresher loop exits → in-flight tasks aborted
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger on-demand refresh
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then the refresh loop
//! - The snapshot is served (empty) before the first cycle completes

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_locator, build_locator_with, Components, Extensions, StartupError};

//! Refresh subsystem.
//!
//! # Data Flow
//! ```text
//! start / fixed delay elapsed / RefreshHandle::trigger()
//!     → scheduler.rs: Idle → Running
//!     → one task per source: timeout(source.timeout, pipeline.run(source))
//!     → cache.update_source(...) as each task completes
//!     → report.rs: SourceOutcome per source, CycleReport per cycle
//!     → MetricsSink
//!     → Running → Idle
//! ```
//!
//! # Design Decisions
//! - The delay is measured between cycles, not from cycle start
//! - Triggers during a running cycle coalesce into one follow-up cycle
//! - A timed-out task is dropped, which cancels its in-flight request
//! - No source waits for another; publication happens per completion

pub mod report;
pub mod scheduler;

pub use report::{CycleReport, SourceOutcome, UpdateResult};
pub use scheduler::{RefreshHandle, Refresher, RefresherState};

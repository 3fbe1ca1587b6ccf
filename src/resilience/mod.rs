//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Fetch of one source's document:
//!     → retries.rs (transient failure? sleep with backoff, try again)
//!     → backoff.rs (exponential delay, capped, jittered)
//!     → bounded overall by the source's hard timeout in the refresher
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every source run has a deadline
//! - Only transient fetch errors are retried, parse/build errors never are

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;

//! OpenAPI route definition locator.
//!
//! Derives gateway route definitions from the OpenAPI documents published by
//! backend services, keeps them fresh in the background, and serves the
//! merged routing table to the dispatch layer without blocking.
//!
//! # Architecture Overview
//!
//! ```text
//!   config ──▶ source registry ──▶ refresher (fixed delay / on demand)
//!                                      │ one task per source, hard timeout
//!                                      ▼
//!                    fetch ──▶ openapi parse ──▶ route build (+ customizers)
//!                                      │
//!                                      ▼
//!                      route cache (ArcSwap, per-source sets)
//!                                      │ merge, resolve collisions
//!                                      ▼
//!             locator.current_routes() ──▶ dispatch layer (lock-free read)
//! ```

// Core subsystems
pub mod config;
pub mod fetch;
pub mod openapi;
pub mod routing;
pub mod source;

// Route lifecycle
pub mod cache;
pub mod locator;
pub mod pipeline;
pub mod refresh;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use cache::RoutingSnapshot;
pub use config::LocatorConfig;
pub use lifecycle::{build_locator, Shutdown};
pub use locator::Locator;
pub use routing::RouteDefinition;

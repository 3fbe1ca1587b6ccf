//! Route definition locator: the read side used by the dispatch layer.

use std::sync::Arc;

use crate::cache::{RouteCache, RoutingSnapshot, SourceRouteSet};
use crate::refresh::RefreshHandle;
use crate::routing::{HttpMethod, RouteDefinition};

/// Lock-free access to the current routing table.
///
/// Cloning is cheap; all clones observe the same cache.
#[derive(Debug, Clone)]
pub struct Locator {
    cache: Arc<RouteCache>,
    refresh: RefreshHandle,
}

impl Locator {
    pub fn new(cache: Arc<RouteCache>, refresh: RefreshHandle) -> Self {
        Self { cache, refresh }
    }

    /// The latest published snapshot. Never performs I/O and never blocks;
    /// before the first refresh completes the snapshot is empty.
    pub fn current_routes(&self) -> Arc<RoutingSnapshot> {
        self.cache.current_snapshot()
    }

    /// Resolve a request against the current snapshot.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<RouteDefinition> {
        self.current_routes().find(method, path).cloned()
    }

    /// Per-source state, including freshness and the last error.
    pub fn sources(&self) -> Vec<Arc<SourceRouteSet>> {
        self.cache.sources()
    }

    /// Ask the refresher for an out-of-schedule cycle.
    pub fn refresh(&self) {
        self.refresh.trigger();
    }
}

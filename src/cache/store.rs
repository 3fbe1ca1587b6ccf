//! Shared route cache with lock-free reads.
//!
//! # Responsibilities
//! - Hold exactly one route set per registered source
//! - Apply pipeline outcomes: publish on success, keep stale routes on
//!   failure, evict once a source has failed for too long
//! - Rebuild and publish the merged snapshot after every route change
//!
//! # Design Decisions
//! - All state sits behind one `ArcSwap`; writers use read-copy-update so
//!   concurrent source updates are never lost or published out of order
//! - Readers take one atomic load and never block writers
//! - The update closure may run more than once under contention, so it
//!   only derives new state from the state it is given

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::cache::snapshot::{RoutingSnapshot, SourceRouteSet, SourceStatus};
use crate::pipeline::{PipelineFailure, PipelineResult};
use crate::source::SourceRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("unknown route source '{0}'")]
    UnknownSource(String),
}

/// What one applied outcome did to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUpdate {
    pub source_id: String,
    pub status: SourceStatus,
    pub generation: u64,
    /// Whether the source's routes differ from before, by content.
    pub changed: bool,
    pub added: usize,
    pub removed: usize,
    pub route_count: usize,
    /// Version of the snapshot published after the update.
    pub snapshot_version: u64,
}

#[derive(Debug)]
struct CacheState {
    sources: Vec<Arc<SourceRouteSet>>,
    snapshot: Arc<RoutingSnapshot>,
}

/// Per-source route sets plus the merged snapshot.
#[derive(Debug)]
pub struct RouteCache {
    state: ArcSwap<CacheState>,
    max_staleness: Duration,
}

impl RouteCache {
    /// Seed one empty, pending set per registered source.
    pub fn new(registry: &SourceRegistry, max_staleness: Duration) -> Self {
        let sources = registry
            .sources()
            .iter()
            .map(|source| Arc::new(SourceRouteSet::pending(source.id.clone(), source.rank)))
            .collect::<Vec<_>>();
        let snapshot = Arc::new(RoutingSnapshot::merge(0, &sources));

        Self {
            state: ArcSwap::from_pointee(CacheState { sources, snapshot }),
            max_staleness,
        }
    }

    /// The currently published snapshot. Never blocks.
    pub fn current_snapshot(&self) -> Arc<RoutingSnapshot> {
        self.state.load().snapshot.clone()
    }

    pub fn source(&self, source_id: &str) -> Option<Arc<SourceRouteSet>> {
        self.state
            .load()
            .sources
            .iter()
            .find(|set| set.source_id == source_id)
            .cloned()
    }

    pub fn sources(&self) -> Vec<Arc<SourceRouteSet>> {
        self.state.load().sources.clone()
    }

    pub fn max_staleness(&self) -> Duration {
        self.max_staleness
    }

    /// Apply a pipeline outcome for `source_id`.
    pub fn update_source(
        &self,
        source_id: &str,
        outcome: &Result<PipelineResult, PipelineFailure>,
    ) -> Result<SourceUpdate, CacheError> {
        self.update_source_at(source_id, outcome, Instant::now())
    }

    /// Like `update_source`, with an explicit clock reading.
    pub fn update_source_at(
        &self,
        source_id: &str,
        outcome: &Result<PipelineResult, PipelineFailure>,
        now: Instant,
    ) -> Result<SourceUpdate, CacheError> {
        if self.source(source_id).is_none() {
            return Err(CacheError::UnknownSource(source_id.to_string()));
        }

        let mut applied = None;
        self.state.rcu(|state| {
            let index = state
                .sources
                .iter()
                .position(|set| set.source_id == source_id)
                .unwrap_or_default();
            let current = &state.sources[index];

            let (next, rebuild) = match outcome {
                Ok(result) => (self.on_success(current, result, now), true),
                Err(failure) => self.on_failure(current, failure, now),
            };
            let next = Arc::new(next);

            let mut sources = state.sources.clone();
            sources[index] = next.clone();
            let snapshot = if rebuild {
                Arc::new(RoutingSnapshot::merge(state.snapshot.version + 1, &sources))
            } else {
                state.snapshot.clone()
            };

            applied = Some(describe(current, &next, snapshot.version));
            Arc::new(CacheState { sources, snapshot })
        });

        applied.ok_or_else(|| CacheError::UnknownSource(source_id.to_string()))
    }

    fn on_success(&self, current: &SourceRouteSet, result: &PipelineResult, now: Instant) -> SourceRouteSet {
        SourceRouteSet {
            source_id: current.source_id.clone(),
            rank: current.rank,
            generation: current.generation + 1,
            routes: result.routes.clone(),
            diagnostics: result.diagnostics.clone(),
            status: SourceStatus::Fresh,
            last_success: Some(now),
            failing_since: None,
            last_error: None,
        }
    }

    /// Returns the next set and whether the snapshot must be rebuilt.
    fn on_failure(
        &self,
        current: &SourceRouteSet,
        failure: &PipelineFailure,
        now: Instant,
    ) -> (SourceRouteSet, bool) {
        let failing_since = current.failing_since.unwrap_or(now);
        let mut next = SourceRouteSet {
            failing_since: Some(failing_since),
            last_error: Some(failure.clone()),
            ..current.clone()
        };

        if current.status == SourceStatus::Evicted {
            return (next, false);
        }

        if now.saturating_duration_since(failing_since) >= self.max_staleness {
            next.routes.clear();
            next.diagnostics.clear();
            next.generation += 1;
            next.status = SourceStatus::Evicted;
            return (next, true);
        }

        next.status = SourceStatus::StaleOnError;
        (next, false)
    }
}

fn describe(previous: &SourceRouteSet, next: &SourceRouteSet, snapshot_version: u64) -> SourceUpdate {
    let before: HashSet<&str> = previous.routes.iter().map(|r| r.id.as_str()).collect();
    let after: HashSet<&str> = next.routes.iter().map(|r| r.id.as_str()).collect();

    SourceUpdate {
        source_id: next.source_id.clone(),
        status: next.status,
        generation: next.generation,
        changed: previous.routes != next.routes,
        added: after.difference(&before).count(),
        removed: before.difference(&after).count(),
        route_count: next.routes.len(),
        snapshot_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::routing::{HttpMethod, PathPattern, RouteDefinition};
    use crate::source::{ConversionOptions, RouteSource};
    use url::Url;

    fn registry(ids: &[&str]) -> SourceRegistry {
        SourceRegistry::from_sources(
            ids.iter()
                .map(|id| RouteSource {
                    id: id.to_string(),
                    rank: 0,
                    base_uri: Url::parse(&format!("http://{}:8080", id)).unwrap(),
                    document_url: Url::parse(&format!("http://{}:8080/openapi", id)).unwrap(),
                    timeout: Duration::from_secs(1),
                    options: ConversionOptions::default(),
                })
                .collect(),
        )
    }

    fn routes(source: &str, paths: &[&str]) -> Result<PipelineResult, PipelineFailure> {
        Ok(PipelineResult {
            routes: paths
                .iter()
                .map(|p| {
                    let path = PathPattern::parse(p).unwrap();
                    RouteDefinition {
                        id: RouteDefinition::route_id(source, HttpMethod::Get, &path),
                        source_id: source.into(),
                        path,
                        method: HttpMethod::Get,
                        predicates: Vec::new(),
                        target_uri: Url::parse("http://backend:8080/").unwrap(),
                        filters: Vec::new(),
                        metadata: Default::default(),
                        order: 0,
                    }
                })
                .collect(),
            diagnostics: Vec::new(),
        })
    }

    fn failure() -> Result<PipelineResult, PipelineFailure> {
        Err(FetchError::ConnectionRefused("orders:8080".into()).into())
    }

    #[test]
    fn test_seeded_pending() {
        let cache = RouteCache::new(&registry(&["orders", "users"]), Duration::from_secs(900));
        let snapshot = cache.current_snapshot();
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.generations.len(), 2);
        assert_eq!(cache.source("orders").unwrap().status, SourceStatus::Pending);
    }

    #[test]
    fn test_success_publishes_snapshot() {
        let cache = RouteCache::new(&registry(&["orders", "users"]), Duration::from_secs(900));

        let update = cache.update_source("orders", &routes("orders", &["/orders", "/orders/{id}"])).unwrap();
        assert_eq!(update.status, SourceStatus::Fresh);
        assert_eq!(update.generation, 1);
        assert!(update.changed);
        assert_eq!(update.added, 2);
        assert_eq!(update.snapshot_version, 1);

        let snapshot = cache.current_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.generations["orders"], 1);
        assert_eq!(snapshot.generations["users"], 0);

        let update = cache.update_source("orders", &routes("orders", &["/orders", "/orders/{id}"])).unwrap();
        assert!(!update.changed);
        assert_eq!(update.generation, 2);

        let update = cache.update_source("orders", &routes("orders", &["/orders"])).unwrap();
        assert!(update.changed);
        assert_eq!(update.removed, 1);
        assert_eq!(cache.current_snapshot().version, 3);
    }

    #[test]
    fn test_failure_keeps_last_good_routes() {
        let cache = RouteCache::new(&registry(&["orders"]), Duration::from_secs(900));
        cache.update_source("orders", &routes("orders", &["/orders"])).unwrap();
        let before = cache.current_snapshot();

        let update = cache.update_source("orders", &failure()).unwrap();
        assert_eq!(update.status, SourceStatus::StaleOnError);
        assert!(!update.changed);
        assert_eq!(update.generation, 1);

        let after = cache.current_snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        let set = cache.source("orders").unwrap();
        assert_eq!(set.routes.len(), 1);
        assert!(set.last_error.is_some());
    }

    #[test]
    fn test_eviction_after_max_staleness() {
        let cache = RouteCache::new(&registry(&["orders", "users"]), Duration::from_secs(900));
        let start = Instant::now();
        cache.update_source_at("orders", &routes("orders", &["/orders"]), start).unwrap();
        cache.update_source_at("users", &routes("users", &["/users"]), start).unwrap();

        let first_failure = start + Duration::from_secs(60);
        let update = cache.update_source_at("orders", &failure(), first_failure).unwrap();
        assert_eq!(update.status, SourceStatus::StaleOnError);

        let update = cache
            .update_source_at("orders", &failure(), first_failure + Duration::from_secs(899))
            .unwrap();
        assert_eq!(update.status, SourceStatus::StaleOnError);
        assert_eq!(cache.current_snapshot().len(), 2);

        let update = cache
            .update_source_at("orders", &failure(), first_failure + Duration::from_secs(900))
            .unwrap();
        assert_eq!(update.status, SourceStatus::Evicted);
        assert!(update.changed);
        assert_eq!(update.generation, 2);

        let snapshot = cache.current_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.routes[0].source_id, "users");
        assert_eq!(snapshot.generations["orders"], 2);

        let update = cache
            .update_source_at("orders", &routes("orders", &["/orders"]), first_failure + Duration::from_secs(1000))
            .unwrap();
        assert_eq!(update.status, SourceStatus::Fresh);
        assert_eq!(cache.current_snapshot().len(), 2);
        assert!(cache.source("orders").unwrap().failing_since.is_none());
    }

    #[test]
    fn test_unknown_source() {
        let cache = RouteCache::new(&registry(&["orders"]), Duration::from_secs(900));
        assert_eq!(
            cache.update_source("billing", &failure()),
            Err(CacheError::UnknownSource("billing".into()))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_not_lost() {
        let ids: Vec<String> = (0..16).map(|i| format!("svc-{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let cache = Arc::new(RouteCache::new(&registry(&id_refs), Duration::from_secs(900)));

        let mut tasks = tokio::task::JoinSet::new();
        for id in ids.clone() {
            let cache = cache.clone();
            tasks.spawn(async move {
                let path = format!("/{}", id);
                cache.update_source(&id, &routes(&id, &[path.as_str()])).unwrap();
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }

        let snapshot = cache.current_snapshot();
        assert_eq!(snapshot.version, 16);
        assert_eq!(snapshot.len(), 16);
        assert!(snapshot.generations.values().all(|g| *g == 1));
    }
}

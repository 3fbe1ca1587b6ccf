//! Per-source route sets and the merged routing snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::pipeline::PipelineFailure;
use crate::routing::{Diagnostic, HttpMethod, RouteDefinition};

/// Freshness of one source's routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// No refresh has completed yet.
    Pending,
    /// The last refresh succeeded.
    Fresh,
    /// The last refresh failed; the previous routes are still served.
    StaleOnError,
    /// Failing for longer than the staleness limit; routes were dropped.
    Evicted,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Pending => "pending",
            SourceStatus::Fresh => "fresh",
            SourceStatus::StaleOnError => "stale_on_error",
            SourceStatus::Evicted => "evicted",
        }
    }
}

/// Latest known routes of one source. Replaced as a whole, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRouteSet {
    pub source_id: String,
    pub rank: usize,
    /// Bumped every time `routes` is replaced.
    pub generation: u64,
    pub routes: Vec<RouteDefinition>,
    /// Diagnostics of the run that produced `routes`.
    pub diagnostics: Vec<Diagnostic>,
    pub status: SourceStatus,
    pub last_success: Option<Instant>,
    /// Start of the current run of consecutive failures.
    pub failing_since: Option<Instant>,
    pub last_error: Option<PipelineFailure>,
}

impl SourceRouteSet {
    /// Empty set seeded for a source before its first refresh.
    pub fn pending(source_id: impl Into<String>, rank: usize) -> Self {
        Self {
            source_id: source_id.into(),
            rank,
            generation: 0,
            routes: Vec::new(),
            diagnostics: Vec::new(),
            status: SourceStatus::Pending,
            last_success: None,
            failing_since: None,
            last_error: None,
        }
    }
}

/// The merged, immutable route table handed to the dispatch layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RoutingSnapshot {
    /// Increases with every published snapshot.
    pub version: u64,
    /// Surviving routes in match order.
    pub routes: Vec<RouteDefinition>,
    /// Routes that lost a collision, one `ShadowedRoute` each.
    pub shadowed: Vec<Diagnostic>,
    /// Generation of every source whose routes this snapshot reflects.
    pub generations: BTreeMap<String, u64>,
}

impl RoutingSnapshot {
    /// The snapshot served before any refresh completes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge per-source sets into one table.
    ///
    /// Collisions on `(method, normalized path)` are won by the lower rank;
    /// within one source the first route wins. Survivors are ordered by
    /// route order, then path specificity, then source rank, then their
    /// position in the source.
    pub fn merge(version: u64, sets: &[Arc<SourceRouteSet>]) -> Self {
        let mut by_rank: Vec<&SourceRouteSet> = sets.iter().map(Arc::as_ref).collect();
        by_rank.sort_by_key(|set| set.rank);

        let mut owners: HashMap<(HttpMethod, String), &str> = HashMap::new();
        let mut survivors = Vec::new();
        let mut shadowed = Vec::new();

        for set in &by_rank {
            for (index, route) in set.routes.iter().enumerate() {
                match owners.get(&route.collision_key()) {
                    Some(winner) => shadowed.push(Diagnostic::ShadowedRoute {
                        route_id: route.id.clone(),
                        source_id: set.source_id.clone(),
                        shadowed_by: winner.to_string(),
                    }),
                    None => {
                        owners.insert(route.collision_key(), set.source_id.as_str());
                        survivors.push((route.order, set.rank, index, route));
                    }
                }
            }
        }

        survivors.sort_by(|(a_order, a_rank, a_index, a), (b_order, b_rank, b_index, b)| {
            a_order
                .cmp(b_order)
                .then_with(|| a.path.specificity_cmp(&b.path))
                .then_with(|| (a_rank, a_index).cmp(&(b_rank, b_index)))
        });

        Self {
            version,
            routes: survivors.into_iter().map(|(.., route)| route.clone()).collect(),
            shadowed,
            generations: sets
                .iter()
                .map(|set| (set.source_id.clone(), set.generation))
                .collect(),
        }
    }

    /// Number of routes shadowed here that were not shadowed in `previous`.
    pub fn shadowed_since(&self, previous: &RoutingSnapshot) -> usize {
        let before: HashSet<&str> = previous
            .shadowed
            .iter()
            .filter_map(Diagnostic::shadowed_route_id)
            .collect();
        self.shadowed
            .iter()
            .filter_map(Diagnostic::shadowed_route_id)
            .filter(|id| !before.contains(id))
            .count()
    }

    /// First route, in snapshot order, whose path and method match.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|route| route.matches(method, path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

//! Outcomes of refresh cycles.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::cache::{CacheError, SourceUpdate};
use crate::pipeline::{PipelineFailure, Stage};

/// Classification of one source refresh, as exported to metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateResult {
    SuccessWithoutRouteChanges,
    SuccessWithRouteChanges,
    /// The document could not be fetched or parsed.
    FailureRetrieval,
    /// The document was read but routes could not be built or published.
    FailurePublication,
}

impl UpdateResult {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            UpdateResult::SuccessWithoutRouteChanges | UpdateResult::SuccessWithRouteChanges
        )
    }

    /// Coarse label: `success` or `failure`.
    pub fn as_str(&self) -> &'static str {
        if self.is_success() {
            "success"
        } else {
            "failure"
        }
    }

    pub fn detailed_str(&self) -> &'static str {
        match self {
            UpdateResult::SuccessWithoutRouteChanges => "success_without_route_changes",
            UpdateResult::SuccessWithRouteChanges => "success_with_route_changes",
            UpdateResult::FailureRetrieval => "failure_retrieval",
            UpdateResult::FailurePublication => "failure_publication",
        }
    }
}

/// Result of refreshing one source within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub source_id: String,
    pub elapsed: Duration,
    pub result: UpdateResult,
    /// Present whenever the cache accepted the outcome.
    pub update: Option<SourceUpdate>,
    pub failure: Option<PipelineFailure>,
    pub diagnostics: usize,
}

impl SourceOutcome {
    pub(crate) fn new(
        source_id: &str,
        elapsed: Duration,
        failure: Option<PipelineFailure>,
        diagnostics: usize,
        update: Result<SourceUpdate, CacheError>,
    ) -> Self {
        let result = match (&failure, &update) {
            (Some(failure), _) => match failure.stage {
                Stage::Fetch | Stage::Parse => UpdateResult::FailureRetrieval,
                Stage::Build => UpdateResult::FailurePublication,
            },
            (None, Err(_)) => UpdateResult::FailurePublication,
            (None, Ok(update)) if update.changed => UpdateResult::SuccessWithRouteChanges,
            (None, Ok(_)) => UpdateResult::SuccessWithoutRouteChanges,
        };

        Self {
            source_id: source_id.to_string(),
            elapsed,
            result,
            update: update.ok(),
            failure,
            diagnostics,
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.failure.as_ref().map(|f| f.stage)
    }
}

/// Summary of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleReport {
    /// 1-based cycle counter.
    pub cycle: u64,
    pub elapsed: Duration,
    /// One entry per source whose task completed, in completion order.
    pub outcomes: Vec<SourceOutcome>,
    pub snapshot_version: u64,
    pub route_count: usize,
    /// Routes shadowed in the snapshot at the end of the cycle.
    pub shadowed_count: usize,
    /// Routes shadowed now that were not shadowed when the cycle started.
    pub newly_shadowed: usize,
}

impl CycleReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failed_by_stage(&self) -> BTreeMap<Stage, usize> {
        let mut counts = BTreeMap::new();
        for stage in self.outcomes.iter().filter_map(SourceOutcome::failed_stage) {
            *counts.entry(stage).or_insert(0) += 1;
        }
        counts
    }

    pub fn routes_added(&self) -> usize {
        self.updates().map(|u| u.added).sum()
    }

    pub fn routes_removed(&self) -> usize {
        self.updates().map(|u| u.removed).sum()
    }

    pub fn outcome(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.outcomes.iter().find(|o| o.source_id == source_id)
    }

    fn updates(&self) -> impl Iterator<Item = &SourceUpdate> {
        self.outcomes.iter().filter_map(|o| o.update.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SourceStatus;
    use crate::fetch::FetchError;
    use crate::openapi::ParseError;

    fn update(changed: bool, added: usize) -> SourceUpdate {
        SourceUpdate {
            source_id: "orders".into(),
            status: SourceStatus::Fresh,
            generation: 1,
            changed,
            added,
            removed: 0,
            route_count: added,
            snapshot_version: 1,
        }
    }

    #[test]
    fn test_classification() {
        let ok = SourceOutcome::new("orders", Duration::ZERO, None, 0, Ok(update(true, 2)));
        assert_eq!(ok.result, UpdateResult::SuccessWithRouteChanges);
        assert_eq!(ok.result.as_str(), "success");

        let same = SourceOutcome::new("orders", Duration::ZERO, None, 0, Ok(update(false, 0)));
        assert_eq!(same.result.detailed_str(), "success_without_route_changes");

        let fetch = SourceOutcome::new(
            "orders",
            Duration::ZERO,
            Some(FetchError::Timeout.into()),
            0,
            Ok(update(false, 0)),
        );
        assert_eq!(fetch.result, UpdateResult::FailureRetrieval);
        assert_eq!(fetch.result.as_str(), "failure");

        let unknown = SourceOutcome::new(
            "orders",
            Duration::ZERO,
            None,
            0,
            Err(CacheError::UnknownSource("orders".into())),
        );
        assert_eq!(unknown.result, UpdateResult::FailurePublication);
        assert!(unknown.update.is_none());
    }

    #[test]
    fn test_cycle_totals() {
        let report = CycleReport {
            cycle: 1,
            outcomes: vec![
                SourceOutcome::new("orders", Duration::ZERO, None, 0, Ok(update(true, 3))),
                SourceOutcome::new(
                    "users",
                    Duration::ZERO,
                    Some(ParseError::UnsupportedVersion("2.0".into()).into()),
                    0,
                    Ok(update(false, 0)),
                ),
                SourceOutcome::new(
                    "billing",
                    Duration::ZERO,
                    Some(FetchError::HttpStatus(500).into()),
                    0,
                    Ok(update(false, 0)),
                ),
            ],
            ..Default::default()
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.routes_added(), 3);
        let stages = report.failed_by_stage();
        assert_eq!(stages[&Stage::Parse], 1);
        assert_eq!(stages[&Stage::Fetch], 1);
        assert!(report.outcome("users").is_some());
    }
}

//! Refresh scheduling.
//!
//! # Responsibilities
//! - Run a cycle at start, then after a fixed delay or on demand
//! - Fan out one task per source, each under its hard timeout
//! - Apply each outcome to the cache as soon as its task completes
//! - Report per-source outcomes and cycle summaries to the metrics sink
//!
//! # Design Decisions
//! - At most one cycle runs at a time; `run_cycle` callers queue on a lock
//!   held for the whole cycle, so no source ever has two writers

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex, MutexGuard, Notify};
use tokio::task::JoinSet;

use crate::cache::RouteCache;
use crate::observability::metrics::MetricsSink;
use crate::pipeline::{PipelineFailure, SourcePipeline};
use crate::refresh::report::{CycleReport, SourceOutcome};
use crate::source::{RouteSource, SourceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    Idle,
    Running,
}

/// Cloneable handle for requesting refreshes from outside the loop.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    trigger: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl RefreshHandle {
    /// Request a cycle as soon as possible.
    ///
    /// Requests made while a cycle is running collapse into a single
    /// follow-up cycle.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub fn state(&self) -> RefresherState {
        if self.running.load(Ordering::Acquire) {
            RefresherState::Running
        } else {
            RefresherState::Idle
        }
    }
}

/// Drives refresh cycles for every registered source.
pub struct Refresher {
    registry: Arc<SourceRegistry>,
    pipeline: Arc<SourcePipeline>,
    cache: Arc<RouteCache>,
    interval: Duration,
    metrics: Option<Arc<dyn MetricsSink>>,
    trigger: Arc<Notify>,
    running: Arc<AtomicBool>,
    cycle_lock: Mutex<()>,
    cycles: AtomicU64,
}

/// Marks the refresher Running while held; the exclusive cycle lock goes
/// with it.
struct RunningGuard<'a> {
    running: &'a AtomicBool,
    _cycle: MutexGuard<'a, ()>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Refresher {
    pub fn new(
        registry: Arc<SourceRegistry>,
        pipeline: Arc<SourcePipeline>,
        cache: Arc<RouteCache>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            pipeline,
            cache,
            interval,
            metrics: None,
            trigger: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
            cycle_lock: Mutex::new(()),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn handle(&self) -> RefreshHandle {
        RefreshHandle {
            trigger: self.trigger.clone(),
            running: self.running.clone(),
        }
    }

    pub fn cache(&self) -> &Arc<RouteCache> {
        &self.cache
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Run cycles until shutdown is signalled.
    ///
    /// A cycle in flight when shutdown arrives is abandoned; its source tasks
    /// are aborted.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            sources = self.registry.len(),
            interval_secs = self.interval.as_secs(),
            "Refresher starting"
        );

        loop {
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = shutdown.recv() => {
                    tracing::info!("Refresher received shutdown signal during cycle, exiting loop");
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    tracing::debug!("Scheduled refresh due");
                }
                _ = self.trigger.notified() => {
                    tracing::debug!("On-demand refresh requested");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Refresher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Refresh every source once and return the cycle summary.
    ///
    /// Waits for any cycle already in flight to finish before starting.
    pub async fn run_cycle(&self) -> CycleReport {
        let _running = self.begin_cycle().await;
        let cycle = self.cycles.fetch_add(1, Ordering::AcqRel) + 1;
        let started = Instant::now();
        let previous = self.cache.current_snapshot();

        tracing::debug!(cycle, sources = self.registry.len(), "Refresh cycle starting");

        let mut tasks = JoinSet::new();
        for source in self.registry.sources() {
            tasks.spawn(refresh_source(
                source.clone(),
                self.pipeline.clone(),
                self.cache.clone(),
                self.metrics.clone(),
            ));
        }

        let mut outcomes = Vec::with_capacity(self.registry.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!(cycle, error = %e, "Source refresh task failed"),
            }
        }

        let snapshot = self.cache.current_snapshot();
        let report = CycleReport {
            cycle,
            elapsed: started.elapsed(),
            outcomes,
            snapshot_version: snapshot.version,
            route_count: snapshot.len(),
            shadowed_count: snapshot.shadowed.len(),
            newly_shadowed: snapshot.shadowed_since(&previous),
        };

        tracing::info!(
            cycle,
            succeeded = report.succeeded(),
            failed = report.failed(),
            added = report.routes_added(),
            removed = report.routes_removed(),
            routes = report.route_count,
            shadowed = report.shadowed_count,
            newly_shadowed = report.newly_shadowed,
            snapshot_version = report.snapshot_version,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Refresh cycle complete"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(&report);
        }
        report
    }

    async fn begin_cycle(&self) -> RunningGuard<'_> {
        let cycle = self.cycle_lock.lock().await;
        self.running.store(true, Ordering::Release);
        RunningGuard {
            running: &self.running,
            _cycle: cycle,
        }
    }
}

async fn refresh_source(
    source: Arc<RouteSource>,
    pipeline: Arc<SourcePipeline>,
    cache: Arc<RouteCache>,
    metrics: Option<Arc<dyn MetricsSink>>,
) -> SourceOutcome {
    let started = Instant::now();
    let outcome = match tokio::time::timeout(source.timeout, pipeline.run(&source)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(PipelineFailure::timeout()),
    };
    let update = cache.update_source(&source.id, &outcome);

    let (failure, diagnostics) = match outcome {
        Ok(result) => {
            for diagnostic in &result.diagnostics {
                tracing::warn!(source = %source.id, "{}", diagnostic);
            }
            (None, result.diagnostics.len())
        }
        Err(failure) => (Some(failure), 0),
    };

    let outcome = SourceOutcome::new(&source.id, started.elapsed(), failure, diagnostics, update);
    match (&outcome.failure, &outcome.update) {
        (None, Some(update)) => tracing::info!(
            source = %source.id,
            result = outcome.result.detailed_str(),
            routes = update.route_count,
            added = update.added,
            removed = update.removed,
            generation = update.generation,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Source refreshed"
        ),
        (Some(failure), update) => tracing::warn!(
            source = %source.id,
            stage = %failure.stage,
            error = %failure.cause,
            status = update.as_ref().map(|u| u.status.as_str()).unwrap_or("unknown"),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Source refresh failed"
        ),
        (None, None) => tracing::error!(source = %source.id, "Source outcome rejected by cache"),
    }

    if let Some(metrics) = &metrics {
        metrics.record_source(&outcome);
    }
    outcome
}

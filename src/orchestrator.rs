//! Runs one worker per partition descriptor on a bounded pool and joins the
//! whole run: success only when every worker succeeded.

use std::collections::VecDeque;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::RunError;
use crate::listener::{LogListener, RunListener, RunProgress, WorkerOutcome};
use crate::partition::{ModuloPlanner, PartitionDescriptor, Planner};
use crate::worker::{PartitionWorker, WorkerSummary};

/// Tunables for one aggregation run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of partitions, and therefore logical workers.
    pub partition_count: u32,
    /// Deltas committed per transaction.
    pub chunk_size: u32,
    /// Events fetched per feed read.
    pub page_size: u32,
    /// Upper bound on concurrently-running workers.
    pub max_workers: u32,
    /// When known, the total event count; diagnostics only.
    pub expected_events: Option<u64>,
}

/// Lifecycle of a run. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Planned,
    Running,
    Succeeded,
    Failed,
}

/// Outcome of a successful run. A failed run surfaces as [`RunError`]
/// instead; there is no partial-success report, even though chunks committed
/// before the failure stay durable.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub chunks_committed: u64,
    pub events_applied: u64,
    pub summaries: Vec<WorkerSummary>,
}

pub struct Orchestrator {
    pool: SqlitePool,
    planner: Arc<dyn Planner + Send + Sync>,
    listener: Arc<dyn RunListener>,
}

impl Orchestrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            planner: Arc::new(ModuloPlanner),
            listener: Arc::new(LogListener),
        }
    }

    #[must_use]
    pub fn with_planner(mut self, planner: Arc<dyn Planner + Send + Sync>) -> Self {
        self.planner = planner;
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn RunListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Plans the partitions, fans workers out over a bounded pool, and joins
    /// them. Fail-fast: the first worker failure aborts the remaining
    /// workers and fails the run; chunks already committed anywhere are
    /// never rolled back.
    #[tracing::instrument(
        skip_all,
        fields(partitions = config.partition_count),
        level = tracing::Level::INFO,
    )]
    pub async fn execute(&self, config: &RunConfig) -> Result<RunReport, RunError> {
        if config.max_workers == 0 {
            return Err(crate::error::ConfigurationError::ZeroWorkers.into());
        }

        let run_id = Uuid::new_v4();
        let descriptors = self.planner.plan(config.partition_count)?;
        let mut state = RunState::Planned;
        debug!(%run_id, ?state, descriptors = descriptors.len(), "run planned");

        let pool_size = config.max_workers.min(config.partition_count);
        let progress = Arc::new(RunProgress::default());
        let queue = Arc::new(Mutex::new(VecDeque::from(descriptors)));

        state = RunState::Running;
        debug!(%run_id, ?state, workers = pool_size, "dispatching workers");

        let mut tasks: JoinSet<Result<Vec<WorkerSummary>, RunError>> = JoinSet::new();
        for _ in 0..pool_size {
            tasks.spawn(run_worker_queue(
                Arc::clone(&queue),
                self.pool.clone(),
                Arc::clone(&self.listener),
                Arc::clone(&progress),
                config.chunk_size,
                config.page_size,
            ));
        }

        let mut summaries = Vec::new();
        let mut failure: Option<RunError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(batch)) => summaries.extend(batch),
                Ok(Err(run_error)) => {
                    failure.get_or_insert(run_error);
                    tasks.abort_all();
                }
                Err(join_error) if join_error.is_cancelled() => {}
                Err(join_error) => {
                    failure.get_or_insert(RunError::Join(join_error));
                    tasks.abort_all();
                }
            }
        }

        if let Some(run_error) = failure {
            state = RunState::Failed;
            error!(%run_id, ?state, error = %run_error, "run failed");
            return Err(run_error);
        }

        state = RunState::Succeeded;
        summaries.sort_by_key(|summary| summary.descriptor.index());
        let report = RunReport {
            run_id,
            state,
            chunks_committed: progress.chunks_committed(),
            events_applied: progress.events_applied(),
            summaries,
        };

        match config.expected_events {
            Some(expected) => info!(
                %run_id,
                ?state,
                applied = report.events_applied,
                expected,
                "run finished"
            ),
            None => info!(%run_id, ?state, applied = report.events_applied, "run finished"),
        }

        Ok(report)
    }
}

/// One pool slot: pulls descriptors off the shared queue and runs a worker
/// for each until the queue drains or a worker fails.
async fn run_worker_queue(
    queue: Arc<Mutex<VecDeque<PartitionDescriptor>>>,
    pool: SqlitePool,
    listener: Arc<dyn RunListener>,
    progress: Arc<RunProgress>,
    chunk_size: u32,
    page_size: u32,
) -> Result<Vec<WorkerSummary>, RunError> {
    let mut summaries = Vec::new();

    loop {
        let next = queue.lock().await.pop_front();
        let Some(descriptor) = next else {
            break;
        };

        listener.before_worker(&descriptor);
        let worker = PartitionWorker::new(
            descriptor,
            pool.clone(),
            chunk_size,
            page_size,
            Arc::clone(&progress),
        )?;

        match worker.run().await {
            Ok(summary) => {
                listener.after_worker(&descriptor, WorkerOutcome::Succeeded(&summary));
                summaries.push(summary);
            }
            Err(source) => {
                listener.after_worker(&descriptor, WorkerOutcome::Failed(&source));
                return Err(RunError::Worker {
                    index: descriptor.index(),
                    source,
                });
            }
        }
    }

    Ok(summaries)
}

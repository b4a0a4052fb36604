//! End-to-end pipeline tests against file-backed SQLite: parallel vs
//! sequential equivalence, combine-rule semantics, restart behavior, and
//! fail-fast propagation.

mod common;

use std::sync::Arc;
use std::sync::Mutex;

use common::{insert_event, seed_mixed_events, setup_db};
use tally::{
    Orchestrator, PartitionDescriptor, RunConfig, RunError, RunListener, RunState, WorkerError,
    WorkerOutcome, fetch_all_scores, fetch_score,
};

fn run_config(partition_count: u32, chunk_size: u32) -> RunConfig {
    RunConfig {
        partition_count,
        chunk_size,
        page_size: 7,
        max_workers: 4,
        expected_events: None,
    }
}

#[tokio::test]
async fn parallel_and_sequential_runs_produce_identical_scores() {
    let (sequential_pool, _ctx, _dir_a) = setup_db().await;
    let (parallel_pool, _ctx_b, _dir_b) = setup_db().await;

    seed_mixed_events(&sequential_pool, 120, 9).await;
    seed_mixed_events(&parallel_pool, 120, 9).await;

    let sequential_report = Orchestrator::new(sequential_pool.clone())
        .execute(&run_config(1, 5))
        .await
        .unwrap();
    let parallel_report = Orchestrator::new(parallel_pool.clone())
        .execute(&run_config(5, 5))
        .await
        .unwrap();

    assert_eq!(sequential_report.state, RunState::Succeeded);
    assert_eq!(parallel_report.state, RunState::Succeeded);
    assert_eq!(sequential_report.events_applied, 120);
    assert_eq!(parallel_report.events_applied, 120);

    let sequential_scores = fetch_all_scores(&sequential_pool).await.unwrap();
    let parallel_scores = fetch_all_scores(&parallel_pool).await.unwrap();
    assert_eq!(sequential_scores, parallel_scores);
    assert_eq!(sequential_scores.len(), 9);
}

#[tokio::test]
async fn combine_rule_add_multiply_add_yields_seven() {
    let (pool, _ctx, _dir) = setup_db().await;
    insert_event(&pool, 1, 1, "plus", 3.0).await;
    insert_event(&pool, 2, 1, "multi", 2.0).await;
    insert_event(&pool, 3, 1, "plus", 1.0).await;

    Orchestrator::new(pool.clone())
        .execute(&run_config(1, 1))
        .await
        .unwrap();

    assert_eq!(fetch_score(&pool, 1).await.unwrap(), Some(7.0));
}

#[tokio::test]
async fn first_multiplicative_event_seeds_a_zero_score() {
    let (pool, _ctx, _dir) = setup_db().await;
    insert_event(&pool, 1, 2, "multi", 3.0).await;

    Orchestrator::new(pool.clone())
        .execute(&run_config(2, 5))
        .await
        .unwrap();

    assert_eq!(fetch_score(&pool, 2).await.unwrap(), Some(0.0));
}

#[tokio::test]
async fn interrupted_run_resumes_without_double_counting() {
    let (pool, _ctx, _dir) = setup_db().await;
    let (control_pool, _control_ctx, _control_dir) = setup_db().await;

    // Chunk one (events 1-3) commits; event 4 kills the run mid-chunk.
    for id in 1..=3 {
        insert_event(&pool, id, 1, "plus", 1.0).await;
        insert_event(&control_pool, id, 1, "plus", 1.0).await;
    }
    insert_event(&pool, 4, 1, "bogus", 5.0).await;
    insert_event(&control_pool, 4, 1, "plus", 5.0).await;
    insert_event(&pool, 5, 1, "multi", 2.0).await;
    insert_event(&control_pool, 5, 1, "multi", 2.0).await;

    let error = Orchestrator::new(pool.clone())
        .execute(&run_config(1, 3))
        .await
        .unwrap_err();
    assert!(matches!(error, RunError::Worker { index: 0, .. }));

    // Durable progress from the committed chunk survives the failure.
    assert_eq!(fetch_score(&pool, 1).await.unwrap(), Some(3.0));

    // Repair the bad event and rerun with the same partition count.
    sqlx::query("UPDATE session_events SET kind = 'plus' WHERE id = 4")
        .execute(&pool)
        .await
        .unwrap();
    Orchestrator::new(pool.clone())
        .execute(&run_config(1, 3))
        .await
        .unwrap();

    // The restarted run must match an uninterrupted run over the same
    // events: (3 + 5) * 2 = 16. Re-applying chunk one would give 22.
    Orchestrator::new(control_pool.clone())
        .execute(&run_config(1, 3))
        .await
        .unwrap();
    assert_eq!(
        fetch_score(&pool, 1).await.unwrap(),
        fetch_score(&control_pool, 1).await.unwrap()
    );
    assert_eq!(fetch_score(&pool, 1).await.unwrap(), Some(16.0));
}

#[tokio::test]
async fn bad_kind_fails_the_run_but_leaves_other_partitions_queryable() {
    let (pool, _ctx, _dir) = setup_db().await;

    // Even users land in partition 0, odd users in partition 1. A single
    // pool slot runs partition 0 to completion before partition 1 fails.
    insert_event(&pool, 1, 2, "plus", 4.0).await;
    insert_event(&pool, 2, 4, "plus", 2.5).await;
    insert_event(&pool, 3, 3, "plus", 1.0).await;
    insert_event(&pool, 4, 3, "bogus", 9.0).await;

    let mut config = run_config(2, 1);
    config.max_workers = 1;
    let error = Orchestrator::new(pool.clone())
        .execute(&config)
        .await
        .unwrap_err();

    match error {
        RunError::Worker { index, source } => {
            assert_eq!(index, 1);
            match source {
                WorkerError::UnknownKind(unknown) => {
                    assert_eq!(unknown.event_id, 4);
                    assert_eq!(unknown.kind, "bogus");
                }
                other => panic!("expected unknown kind, got {other:?}"),
            }
        }
        other => panic!("expected worker failure, got {other:?}"),
    }

    assert_eq!(fetch_score(&pool, 2).await.unwrap(), Some(4.0));
    assert_eq!(fetch_score(&pool, 4).await.unwrap(), Some(2.5));
    // Partition 1 committed event 3's chunk before hitting event 4.
    assert_eq!(fetch_score(&pool, 3).await.unwrap(), Some(1.0));
}

#[tokio::test]
async fn worker_cap_below_partition_count_still_covers_every_partition() {
    let (pool, _ctx, _dir) = setup_db().await;
    seed_mixed_events(&pool, 40, 8).await;

    let mut config = run_config(8, 4);
    config.max_workers = 2;
    let report = Orchestrator::new(pool.clone()).execute(&config).await.unwrap();

    assert_eq!(report.summaries.len(), 8);
    assert_eq!(report.events_applied, 40);
}

/// Listener that records lifecycle notifications across threads.
#[derive(Debug, Default)]
struct CountingListener {
    seen: Mutex<Vec<(u32, bool)>>,
}

impl RunListener for CountingListener {
    fn before_worker(&self, _descriptor: &PartitionDescriptor) {}

    fn after_worker(&self, descriptor: &PartitionDescriptor, outcome: WorkerOutcome<'_>) {
        let succeeded = matches!(outcome, WorkerOutcome::Succeeded(_));
        self.seen.lock().unwrap().push((descriptor.index(), succeeded));
    }
}

#[tokio::test]
async fn listener_sees_every_partition_outcome() {
    let (pool, _ctx, _dir) = setup_db().await;
    seed_mixed_events(&pool, 20, 6).await;

    let listener = Arc::new(CountingListener::default());
    Orchestrator::new(pool)
        .with_listener(Arc::clone(&listener) as Arc<dyn RunListener>)
        .execute(&run_config(3, 4))
        .await
        .unwrap();

    let mut seen = listener.seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, vec![(0, true), (1, true), (2, true)]);
}

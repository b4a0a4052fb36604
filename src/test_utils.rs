//! Shared test fixtures: in-memory database setup and event seeding.

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::orchestrator::RunConfig;

/// In-memory SQLite with all migrations applied. A single connection keeps
/// every query on the same in-memory database.
pub(crate) async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

pub(crate) async fn insert_event(pool: &SqlitePool, id: i64, user_id: i64, kind: &str, amount: f64) {
    sqlx::query("INSERT INTO session_events (id, user_id, kind, amount) VALUES (?1, ?2, ?3, ?4)")
        .bind(id)
        .bind(user_id)
        .bind(kind)
        .bind(amount)
        .execute(pool)
        .await
        .unwrap();
}

/// Small-scale run parameters for tests.
pub(crate) fn run_config(partition_count: u32, chunk_size: u32) -> RunConfig {
    RunConfig {
        partition_count,
        chunk_size,
        page_size: 3,
        max_workers: 4,
        expected_events: None,
    }
}

//! Shared helpers for pipeline integration tests: a file-backed SQLite
//! database per test (so concurrent workers exercise real WAL commits) and
//! event seeding.

use sqlx::SqlitePool;
use tempfile::TempDir;

use tally::config::Ctx;

/// A migrated, file-backed database built through the same config path the
/// CLI uses. The `TempDir` keeps the file alive for the test's duration.
pub async fn setup_db() -> (SqlitePool, Ctx, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let config_toml = format!(
        r#"database_url = "sqlite://{}?mode=rwc""#,
        db_path.display()
    );

    let ctx = Ctx::from_toml(&config_toml).unwrap();
    let pool = ctx.get_sqlite_pool().await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    (pool, ctx, dir)
}

pub async fn insert_event(pool: &SqlitePool, id: i64, user_id: i64, kind: &str, amount: f64) {
    sqlx::query("INSERT INTO session_events (id, user_id, kind, amount) VALUES (?1, ?2, ?3, ?4)")
        .bind(id)
        .bind(user_id)
        .bind(kind)
        .bind(amount)
        .execute(pool)
        .await
        .unwrap();
}

/// Deterministic mixed workload: `event_count` events spread over
/// `user_count` users, alternating additive and multiplicative kinds.
pub async fn seed_mixed_events(pool: &SqlitePool, event_count: i64, user_count: i64) {
    for id in 1..=event_count {
        let user_id = 1 + (id * 13 % user_count);
        if id % 3 == 0 {
            insert_event(pool, id, user_id, "multi", 1.0 + (id % 4) as f64 / 10.0).await;
        } else {
            insert_event(pool, id, user_id, "plus", (id % 7) as f64).await;
        }
    }
}

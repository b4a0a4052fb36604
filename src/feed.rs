//! Paged reads over the session event feed, plus the per-partition
//! checkpoint that makes the cursor restartable.
//!
//! Every worker owns an independently-filtered cursor (keyset pagination on
//! `id`), so there is no shared read position to synchronize.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::event::SessionEvent;
use crate::partition::PartitionDescriptor;

/// Fetches the next page of events belonging to `descriptor`, strictly after
/// `after_id`, in ascending `id` order.
///
/// `((user_id % n) + n) % n` mirrors `partition_of`: SQLite's `%` truncates
/// toward zero, so negative keys need the same normalization the Rust side
/// applies.
pub(crate) async fn fetch_page(
    pool: &SqlitePool,
    descriptor: &PartitionDescriptor,
    after_id: i64,
    page_size: u32,
) -> Result<Vec<SessionEvent>, sqlx::Error> {
    sqlx::query_as::<_, SessionEvent>(
        r#"
        SELECT id, user_id, kind, amount
        FROM session_events
        WHERE ((user_id % ?1) + ?1) % ?1 = ?2 AND id > ?3
        ORDER BY id ASC
        LIMIT ?4
        "#,
    )
    .bind(i64::from(descriptor.count()))
    .bind(i64::from(descriptor.index()))
    .bind(after_id)
    .bind(i64::from(page_size))
    .fetch_all(pool)
    .await
}

/// Returns the checkpointed cursor for `descriptor`, if one exists. A rerun
/// with the same partition count resumes strictly after this event id.
pub(crate) async fn load_checkpoint(
    pool: &SqlitePool,
    descriptor: &PartitionDescriptor,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT last_event_id
        FROM partition_checkpoints
        WHERE partition_count = ?1 AND partition_index = ?2
        "#,
    )
    .bind(i64::from(descriptor.count()))
    .bind(i64::from(descriptor.index()))
    .fetch_optional(pool)
    .await
}

/// Advances the checkpoint for `descriptor` to `last_event_id`. Runs inside
/// the same transaction as the chunk it covers, so the checkpoint and the
/// chunk's score writes commit or roll back together.
pub(crate) async fn save_checkpoint<'e, E>(
    executor: E,
    descriptor: &PartitionDescriptor,
    last_event_id: i64,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO partition_checkpoints (partition_count, partition_index, last_event_id)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (partition_count, partition_index) DO UPDATE
        SET last_event_id = excluded.last_event_id, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(i64::from(descriptor.count()))
    .bind(i64::from(descriptor.index()))
    .bind(last_event_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// One checkpoint row, as shown by the status command.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct Checkpoint {
    pub(crate) partition_count: i64,
    pub(crate) partition_index: i64,
    pub(crate) last_event_id: i64,
    pub(crate) updated_at: NaiveDateTime,
}

pub(crate) async fn list_checkpoints(pool: &SqlitePool) -> Result<Vec<Checkpoint>, sqlx::Error> {
    sqlx::query_as::<_, Checkpoint>(
        r#"
        SELECT partition_count, partition_index, last_event_id, updated_at
        FROM partition_checkpoints
        ORDER BY partition_count ASC, partition_index ASC
        "#,
    )
    .fetch_all(pool)
    .await
}

//! Combine-upsert writes and score reads for the user score table.

use sqlx::SqlitePool;

use crate::event::ScoreDelta;

/// Applies one delta to its user's score, atomically per call.
///
/// A missing row is created with `score = adder`; the multiplier takes part
/// only on update, where the row becomes `score * multiplier + adder`. The
/// create/update asymmetry means a user whose first event is multiplicative
/// starts at zero, not at the multiplier.
///
/// Generic over the executor so a worker can run it inside its chunk
/// transaction; no cross-key coordination exists because the partitioning
/// scheme keeps each user single-writer.
pub async fn apply_delta<'e, E>(executor: E, delta: &ScoreDelta) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO user_scores (user_id, score) VALUES (?1, ?2)
        ON CONFLICT (user_id) DO UPDATE SET score = score * ?3 + ?2
        "#,
    )
    .bind(delta.user_id)
    .bind(delta.adder)
    .bind(delta.multiplier)
    .execute(executor)
    .await?;

    Ok(())
}

/// Returns the accumulated score for `user_id`, or `None` when no delta has
/// ever been applied for that user.
pub async fn fetch_score(pool: &SqlitePool, user_id: i64) -> Result<Option<f64>, sqlx::Error> {
    sqlx::query_scalar::<_, f64>("SELECT score FROM user_scores WHERE user_id = ?1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// All `(user_id, score)` rows, ordered by user id.
pub async fn fetch_all_scores(pool: &SqlitePool) -> Result<Vec<(i64, f64)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, f64)>("SELECT user_id, score FROM user_scores ORDER BY user_id ASC")
        .fetch_all(pool)
        .await
}

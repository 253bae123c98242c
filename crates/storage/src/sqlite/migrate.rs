use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations for the local cache.
///
/// Every table is keyed by the sanitized user key so several learners can
/// share one cache file.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: cache tables.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progress_cache (
                    user_key TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    overall_progress REAL NOT NULL
                        CHECK (overall_progress BETWEEN 0 AND 100),
                    completed_lessons TEXT NOT NULL,
                    cached_at TEXT NOT NULL,
                    PRIMARY KEY (user_key, course_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS notification_cache (
                    user_key TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    notification_id TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    PRIMARY KEY (user_key, position)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS seen_markers (
                    user_key TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    marker_id TEXT NOT NULL,
                    seen_at TEXT NOT NULL,
                    PRIMARY KEY (user_key, kind, marker_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    payload TEXT NOT NULL,
                    saved_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}

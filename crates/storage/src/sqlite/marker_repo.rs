use std::collections::BTreeSet;

use cacao_core::model::UserKey;
use chrono::Utc;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{MarkerKind, MarkerRepository, StorageError};

#[async_trait::async_trait]
impl MarkerRepository for SqliteRepository {
    async fn seen(&self, user: &UserKey, kind: MarkerKind) -> Result<BTreeSet<String>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT marker_id
            FROM seen_markers
            WHERE user_key = ?1 AND kind = ?2
            ",
        )
        .bind(user.as_str())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("marker_id").map_err(ser))
            .collect()
    }

    async fn mark_seen(
        &self,
        user: &UserKey,
        kind: MarkerKind,
        ids: &[String],
    ) -> Result<(), StorageError> {
        if ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(conn)?;
        for id in ids {
            sqlx::query(
                r"
                INSERT INTO seen_markers (user_key, kind, marker_id, seen_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_key, kind, marker_id) DO NOTHING
                ",
            )
            .bind(user.as_str())
            .bind(kind.as_str())
            .bind(id.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }
        tx.commit().await.map_err(conn)?;

        Ok(())
    }
}

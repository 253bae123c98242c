use cacao_core::model::{CourseId, CourseProgress, UserKey};
use chrono::Utc;

use super::SqliteRepository;
use super::mapping::{conn, map_progress_row, to_json};
use crate::repository::{ProgressCache, StorageError};

#[async_trait::async_trait]
impl ProgressCache for SqliteRepository {
    async fn cached_progress(
        &self,
        user: &UserKey,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT course_id, overall_progress, completed_lessons
            FROM progress_cache
            WHERE user_key = ?1 AND course_id = ?2
            ",
        )
        .bind(user.as_str())
        .bind(course_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn store_progress(
        &self,
        user: &UserKey,
        progress: &CourseProgress,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO progress_cache (
                user_key, course_id, overall_progress, completed_lessons, cached_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_key, course_id) DO UPDATE SET
                overall_progress = excluded.overall_progress,
                completed_lessons = excluded.completed_lessons,
                cached_at = excluded.cached_at
            ",
        )
        .bind(user.as_str())
        .bind(progress.course_id().as_str())
        .bind(progress.overall_progress())
        .bind(to_json(progress.completed_lessons())?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}

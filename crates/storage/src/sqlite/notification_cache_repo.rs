use cacao_core::model::{Notification, UserKey};

use super::SqliteRepository;
use super::mapping::{conn, map_notification_row, position_to_i64, to_json};
use crate::repository::{NotificationCache, StorageError};

#[async_trait::async_trait]
impl NotificationCache for SqliteRepository {
    async fn cached_notifications(
        &self,
        user: &UserKey,
    ) -> Result<Vec<Notification>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT payload
            FROM notification_cache
            WHERE user_key = ?1
            ORDER BY position ASC
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_notification_row).collect()
    }

    async fn replace_notifications(
        &self,
        user: &UserKey,
        notifications: &[Notification],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM notification_cache WHERE user_key = ?1")
            .bind(user.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, notification) in notifications.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO notification_cache (user_key, position, notification_id, payload)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(user.as_str())
            .bind(position_to_i64(position)?)
            .bind(notification.id.as_str())
            .bind(to_json(notification)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}

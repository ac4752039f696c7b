//! Notifications repository

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::AppResult,
    models::notification::{Notification, NotificationKind},
};

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Record a subscriber-facing message inside the caller's transaction.
    pub async fn insert(
        conn: &mut PgConnection,
        subscriber_id: i32,
        message: &str,
        kind: NotificationKind,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (subscriber_id, message, created_at, kind)
            VALUES ($1, $2, NOW(), $3)
            "#,
        )
        .bind(subscriber_id)
        .bind(message)
        .bind(kind.as_str())
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn for_subscriber(&self, subscriber_id: i32) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE subscriber_id = $1 ORDER BY created_at DESC",
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    /// User-initiated bulk deletion by id list.
    pub async fn delete_by_ids(&self, ids: &[i32]) -> AppResult<bool> {
        if ids.is_empty() {
            return Ok(false);
        }
        let result = sqlx::query("DELETE FROM notifications WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

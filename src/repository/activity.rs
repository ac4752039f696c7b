//! Activity log repository
//!
//! The append writer runs inside the caller's transaction so an audit entry
//! commits or rolls back with the operation it records.

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::AppResult,
    models::activity::{ActivityLogEntry, NewActivity},
};

#[derive(Clone)]
pub struct ActivityRepository {
    pool: Pool<Postgres>,
}

impl ActivityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Append an audit entry inside the caller's transaction.
    pub async fn append(conn: &mut PgConnection, activity: &NewActivity) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_log
                (subscriber_id, librarian_id, book_id, activity_type, activity_date, message)
            VALUES ($1, $2, $3, $4, NOW(), $5)
            "#,
        )
        .bind(activity.subscriber_id)
        .bind(activity.librarian_id)
        .bind(activity.book_id)
        .bind(activity.activity_type.as_str())
        .bind(&activity.message)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// All activity, newest first
    pub async fn list_all(&self) -> AppResult<Vec<ActivityLogEntry>> {
        let logs = sqlx::query_as::<_, ActivityLogEntry>(
            "SELECT * FROM activity_log ORDER BY activity_date DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    /// Activity for one subscriber, newest first
    pub async fn for_subscriber(&self, subscriber_id: i32) -> AppResult<Vec<ActivityLogEntry>> {
        let logs = sqlx::query_as::<_, ActivityLogEntry>(
            r#"
            SELECT * FROM activity_log
            WHERE subscriber_id = $1
            ORDER BY activity_date DESC, id DESC
            "#,
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}

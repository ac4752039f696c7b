//! Subscribers repository

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::AppResult,
    models::subscriber::{Subscriber, SubscriberStatus},
};

#[derive(Clone)]
pub struct SubscribersRepository {
    pool: Pool<Postgres>,
}

impl SubscribersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Option<Subscriber>> {
        let subscriber = sqlx::query_as::<_, Subscriber>("SELECT * FROM subscribers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(subscriber)
    }

    /// List all members
    pub async fn list_all(&self) -> AppResult<Vec<Subscriber>> {
        let members =
            sqlx::query_as::<_, Subscriber>("SELECT * FROM subscribers ORDER BY full_name")
                .fetch_all(&self.pool)
                .await?;
        Ok(members)
    }

    /// Does any member already use this phone number?
    pub async fn exists_with_phone(&self, phone: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM subscribers WHERE phone = $1)")
                .bind(phone)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Register a new member. The id is generated by the store; new members
    /// start ACTIVE.
    pub async fn insert(
        &self,
        full_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> AppResult<Subscriber> {
        let subscriber = sqlx::query_as::<_, Subscriber>(
            r#"
            INSERT INTO subscribers (full_name, email, phone, status)
            VALUES ($1, $2, $3, 'ACTIVE')
            RETURNING *
            "#,
        )
        .bind(full_name)
        .bind(email)
        .bind(phone)
        .fetch_one(&self.pool)
        .await?;
        Ok(subscriber)
    }

    /// Update a member's contact details. Returns false when no such member
    /// exists. Status is not touched here; only the lending engine and the
    /// reactivation sweep change it.
    pub async fn update_contact(
        &self,
        id: i32,
        full_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE subscribers SET full_name = $1, email = $2, phone = $3 WHERE id = $4")
                .bind(full_name)
                .bind(email)
                .bind(phone)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn fetch_for_update(
        conn: &mut PgConnection,
        id: i32,
    ) -> AppResult<Option<Subscriber>> {
        let subscriber =
            sqlx::query_as::<_, Subscriber>("SELECT * FROM subscribers WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(conn)
                .await?;
        Ok(subscriber)
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        id: i32,
        status: SubscriberStatus,
    ) -> AppResult<()> {
        sqlx::query("UPDATE subscribers SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Append a status transition. The history table is append-only; the
    /// reactivation sweep reads only the most recent row per subscriber.
    pub async fn append_status_history(
        conn: &mut PgConnection,
        id: i32,
        status: SubscriberStatus,
        change_date: NaiveDate,
        reason: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriber_status_history (subscriber_id, status, change_date, reason)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(change_date)
        .bind(reason)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Subscribers whose current status is FROZEN and whose most recent
    /// history row is a FROZEN transition at least `freeze_days` old.
    pub async fn frozen_due_for_reactivation(
        &self,
        today: NaiveDate,
        freeze_days: i64,
    ) -> AppResult<Vec<i32>> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT s.id
            FROM subscribers s
            JOIN subscriber_status_history h ON h.subscriber_id = s.id
            WHERE s.status = 'FROZEN'
              AND h.status = 'FROZEN'
              AND $1 - h.change_date >= $2
              AND h.change_date = (
                  SELECT MAX(change_date)
                  FROM subscriber_status_history
                  WHERE subscriber_id = s.id
              )
            ORDER BY s.id
            "#,
        )
        .bind(today)
        .bind(freeze_days as i32)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

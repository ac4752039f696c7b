//! Loans repository

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres, Row};

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanHistoryEntry},
};

/// Book due tomorrow, for the reminder sweep.
#[derive(Debug, Clone)]
pub struct DueLoan {
    pub subscriber_id: i32,
    pub book_id: i32,
    pub title: String,
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Borrow history for a subscriber, newest first
    pub async fn history_for(&self, subscriber_id: i32) -> AppResult<Vec<LoanHistoryEntry>> {
        let entries = sqlx::query_as::<_, LoanHistoryEntry>(
            r#"
            SELECT l.id as loan_id, l.book_id, b.title,
                   l.loan_date, l.due_date, l.actual_return_date
            FROM loans l
            JOIN books b ON l.book_id = b.id
            WHERE l.subscriber_id = $1
            ORDER BY l.loan_date DESC, l.id DESC
            "#,
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// The open loan for a (book, subscriber) pair, locked for the
    /// transaction. There is at most one.
    pub async fn open_loan_for_update(
        conn: &mut PgConnection,
        book_id: i32,
        subscriber_id: i32,
    ) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE book_id = $1 AND subscriber_id = $2 AND actual_return_date IS NULL
            FOR UPDATE
            "#,
        )
        .bind(book_id)
        .bind(subscriber_id)
        .fetch_optional(conn)
        .await?;
        Ok(loan)
    }

    pub async fn has_open_loan(
        conn: &mut PgConnection,
        book_id: i32,
        subscriber_id: i32,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE book_id = $1 AND subscriber_id = $2 AND actual_return_date IS NULL
            )
            "#,
        )
        .bind(book_id)
        .bind(subscriber_id)
        .fetch_one(conn)
        .await?;
        Ok(exists)
    }

    pub async fn insert(
        conn: &mut PgConnection,
        subscriber_id: i32,
        book_id: i32,
        loan_date: NaiveDate,
        due_date: NaiveDate,
    ) -> AppResult<i32> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO loans (subscriber_id, book_id, loan_date, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(subscriber_id)
        .bind(book_id)
        .bind(loan_date)
        .bind(due_date)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// Close a loan. The open-loan lookup guarantees this happens once.
    pub async fn close(
        conn: &mut PgConnection,
        loan_id: i32,
        actual_return_date: NaiveDate,
    ) -> AppResult<()> {
        sqlx::query("UPDATE loans SET actual_return_date = $1 WHERE id = $2")
            .bind(actual_return_date)
            .bind(loan_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn extend_due(
        conn: &mut PgConnection,
        loan_id: i32,
        new_due: NaiveDate,
    ) -> AppResult<()> {
        sqlx::query("UPDATE loans SET due_date = $1 WHERE id = $2")
            .bind(new_due)
            .bind(loan_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Open loans due exactly on the given date, for the reminder sweep.
    pub async fn open_loans_due_on(
        conn: &mut PgConnection,
        due: NaiveDate,
    ) -> AppResult<Vec<DueLoan>> {
        let rows = sqlx::query(
            r#"
            SELECT l.subscriber_id, l.book_id, b.title
            FROM loans l
            JOIN books b ON l.book_id = b.id
            WHERE l.due_date = $1 AND l.actual_return_date IS NULL
            "#,
        )
        .bind(due)
        .fetch_all(conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DueLoan {
                subscriber_id: row.get("subscriber_id"),
                book_id: row.get("book_id"),
                title: row.get("title"),
            })
            .collect())
    }
}
